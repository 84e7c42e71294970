#![allow(dead_code)]

use async_trait::async_trait;
use converge_transfer::{FileSystem, GroupId, LocalFileSystem, Metadata};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Local filesystem that records how many reads overlap, and fails or
/// panics on demand
#[derive(Default)]
pub struct InstrumentedFs {
    inner: LocalFileSystem,
    read_delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    reads: AtomicUsize,
    failing_writes: Mutex<HashSet<PathBuf>>,
    panicking_reads: Mutex<HashSet<PathBuf>>,
}

impl InstrumentedFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.failing_writes.lock().unwrap().insert(path.into());
    }

    pub fn panic_on_read(&self, path: impl Into<PathBuf>) {
        self.panicking_reads.lock().unwrap().insert(path.into());
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystem for InstrumentedFs {
    async fn metadata(&self, path: &Path) -> io::Result<Option<Metadata>> {
        self.inner.metadata(path).await
    }

    async fn metadata_follow(&self, path: &Path) -> io::Result<Option<Metadata>> {
        self.inner.metadata_follow(path).await
    }

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.inner.read_link(path).await
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.inner.symlink(target, link).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir_all(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if self.panicking_reads.lock().unwrap().contains(path) {
            panic!("injected panic reading {}", path.display());
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        let result = self.inner.read(path).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.failing_writes.lock().unwrap().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected write failure",
            ));
        }
        self.inner.write(path, contents).await
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.set_mode(path, mode).await
    }

    async fn set_group(&self, path: &Path, group: &GroupId) -> io::Result<()> {
        self.inner.set_group(path, group).await
    }
}

/// Source and destination trees in a scratch directory
pub struct Trees {
    pub dir: tempfile::TempDir,
}

impl Trees {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("dst")).unwrap();
        Self { dir }
    }

    pub fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn dst(&self) -> PathBuf {
        self.dir.path().join("dst")
    }

    /// Write `contents` at `relative` under the source tree
    pub fn source_file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.src().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn read_dst(&self, relative: &str) -> String {
        std::fs::read_to_string(self.dst().join(relative)).unwrap()
    }
}
