//! Filesystem seam
//!
//! Both sides of a transfer are reached through [`FileSystem`]. The host
//! filesystem is [`LocalFileSystem`]; a remote channel (SFTP, ...) provides
//! its own implementation.

use crate::unit::GroupId;
use async_trait::async_trait;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
    /// Permission bits
    pub mode: u32,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Metadata of the entry itself (links are not followed), `None` if
    /// nothing exists at `path`
    async fn metadata(&self, path: &Path) -> io::Result<Option<Metadata>>;

    /// Metadata of what `path` resolves to, `None` if it does not resolve
    async fn metadata_follow(&self, path: &Path) -> io::Result<Option<Metadata>>;

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a link at `link` pointing to `target`
    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    async fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    async fn set_group(&self, path: &Path, group: &GroupId) -> io::Result<()>;
}

/// The host filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

fn not_found_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn convert(metadata: std::fs::Metadata) -> Metadata {
    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Metadata {
        kind,
        len: metadata.len(),
        mode: metadata.permissions().mode() & 0o7777,
    }
}

fn resolve_gid(group: &GroupId) -> io::Result<nix::unistd::Gid> {
    match group {
        GroupId::Gid(gid) => Ok(nix::unistd::Gid::from_raw(*gid)),
        GroupId::Name(name) => nix::unistd::Group::from_name(name)
            .map_err(io::Error::from)?
            .map(|g| g.gid)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("unknown group '{}'", name))
            }),
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn metadata(&self, path: &Path) -> io::Result<Option<Metadata>> {
        Ok(not_found_as_none(tokio::fs::symlink_metadata(path).await)?.map(convert))
    }

    async fn metadata_follow(&self, path: &Path) -> io::Result<Option<Metadata>> {
        Ok(not_found_as_none(tokio::fs::metadata(path).await)?.map(convert))
    }

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        tokio::fs::read_link(path).await
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        tokio::fs::symlink(target, link).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
    }

    async fn set_group(&self, path: &Path, group: &GroupId) -> io::Result<()> {
        let path = path.to_path_buf();
        let group = group.clone();
        tokio::task::spawn_blocking(move || {
            let gid = resolve_gid(&group)?;
            nix::unistd::chown(&path, None, Some(gid)).map_err(io::Error::from)
        })
        .await
        .map_err(io::Error::other)?
    }
}
