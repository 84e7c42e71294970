//! Transfer of a single unit

use crate::error::{UnitError, UnitErrorKind};
use crate::fs::{FileSystem, Metadata};
use crate::template::TemplatingHandler;
use crate::unit::{Direction, LinkOption, TransferBehavior, TransferUnit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, UnitErrorKind>;

/// Terminal outcome of a unit that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Destination written or updated
    Transferred,
    /// Destination already up to date, or kept per the transfer behavior
    Skipped,
    /// Nothing to transfer: the source (or the link target) does not exist
    SourceMissing,
}

/// Everything a job needs, shared by all the jobs of a run
#[derive(Clone)]
pub(crate) struct JobContext {
    pub source_fs: Arc<dyn FileSystem>,
    pub destination_fs: Arc<dyn FileSystem>,
    pub direction: Direction,
    pub templating: Option<Arc<dyn TemplatingHandler>>,
}

pub(crate) async fn transfer(
    ctx: &JobContext,
    unit: &TransferUnit,
) -> std::result::Result<UnitOutcome, UnitError> {
    debug!(unit = %unit, "Transfer begins");
    let outcome = UnitJob { ctx, unit }
        .run()
        .await
        .map_err(|kind| UnitError {
            source_path: unit.source.clone(),
            destination: unit.destination.clone(),
            kind,
        })?;
    debug!(unit = %unit, outcome = ?outcome, "Transfer ends");
    Ok(outcome)
}

struct UnitJob<'a> {
    ctx: &'a JobContext,
    unit: &'a TransferUnit,
}

impl UnitJob<'_> {
    fn src(&self) -> &dyn FileSystem {
        self.ctx.source_fs.as_ref()
    }

    fn dst(&self) -> &dyn FileSystem {
        self.ctx.destination_fs.as_ref()
    }

    async fn run(&self) -> Result<UnitOutcome> {
        let source = &self.unit.source;
        let destination = &self.unit.destination;

        // Parents only; neither chmod nor chgrp.
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                self.dst()
                    .create_dir_all(parent)
                    .await
                    .map_err(|e| UnitErrorKind::io(parent, e))?;
            }
        }

        let Some(metadata) = self.src_metadata(source).await? else {
            warn!("{} does not exist, skipped", source.display());
            return Ok(UnitOutcome::SourceMissing);
        };

        if metadata.is_symlink() {
            self.link().await
        } else if metadata.is_dir() {
            self.directory().await
        } else {
            self.file(source).await
        }
    }

    async fn link(&self) -> Result<UnitOutcome> {
        let source = &self.unit.source;
        let target = self
            .src()
            .read_link(source)
            .await
            .map_err(|e| UnitErrorKind::io(source, e))?;

        match self.unit.link_option {
            LinkOption::KeepLinks => self.keep_link(&target).await,
            LinkOption::CopyLinks => self.copy_link().await,
            LinkOption::CopyUnsafeLinks => {
                if self.unit.is_safe_link_target(&target) {
                    self.keep_link(&target).await
                } else {
                    debug!(
                        "{} points outside of {}, copying its content",
                        source.display(),
                        self.unit.transfer_root.display()
                    );
                    self.copy_link().await
                }
            }
        }
    }

    /// Recreate the link as-is
    async fn keep_link(&self, target: &Path) -> Result<UnitOutcome> {
        let destination = &self.unit.destination;
        if let Some(existing) = self.dst_metadata(destination).await? {
            if existing.is_symlink() {
                let current = self
                    .dst()
                    .read_link(destination)
                    .await
                    .map_err(|e| UnitErrorKind::io(destination, e))?;
                if current == target {
                    info!("{} already links to {}, skipped", destination.display(), target.display());
                    return Ok(UnitOutcome::Skipped);
                }
            }
            self.remove_destination(&existing).await?;
        }

        self.dst()
            .symlink(target, destination)
            .await
            .map_err(|e| UnitErrorKind::io(destination, e))?;
        Ok(UnitOutcome::Transferred)
    }

    /// Transfer what the link points to
    async fn copy_link(&self) -> Result<UnitOutcome> {
        let source = &self.unit.source;
        let destination = &self.unit.destination;

        let followed = self
            .src()
            .metadata_follow(source)
            .await
            .map_err(|e| UnitErrorKind::io(source, e))?;
        match followed {
            None => {
                // Dangling: whatever sits at the destination is stale.
                if let Some(existing) = self.dst_metadata(destination).await? {
                    self.remove_destination(&existing).await?;
                }
                warn!(
                    "{} is a dangling link, nothing copied to {}",
                    source.display(),
                    destination.display()
                );
                Ok(UnitOutcome::SourceMissing)
            }
            Some(m) if m.is_dir() => self.directory().await,
            Some(_) => self.file(source).await,
        }
    }

    async fn directory(&self) -> Result<UnitOutcome> {
        let destination = &self.unit.destination;
        match self.dst_metadata(destination).await? {
            Some(existing) if existing.is_dir() => {
                debug!("{} already exists", destination.display());
            }
            existing => {
                if let Some(existing) = existing {
                    self.remove_destination(&existing).await?;
                }
                self.dst()
                    .create_dir(destination)
                    .await
                    .map_err(|e| UnitErrorKind::io(destination, e))?;
            }
        }
        self.apply_attributes(self.unit.dir_mode).await?;
        Ok(UnitOutcome::Transferred)
    }

    /// Put the file honoring the transfer behavior, then apply mode and
    /// group. A kept destination still gets its attributes.
    async fn file(&self, source: &Path) -> Result<UnitOutcome> {
        let destination = &self.unit.destination;

        // Rendered before the conflict check so a broken template always fails.
        let local = match self.ctx.direction {
            Direction::Upload => Some(self.render_local(source).await?),
            Direction::Download => None,
        };

        let mut kept = false;
        if let Some(existing) = self.dst_metadata(destination).await? {
            match self.unit.behavior {
                TransferBehavior::SkipIfExists => {
                    info!("{} already exists, skipped", destination.display());
                    kept = true;
                }
                TransferBehavior::FailIfExists => {
                    return Err(UnitErrorKind::AlreadyExists(destination.clone()));
                }
                TransferBehavior::ForceOverwrite => {
                    // Writing through a link would overwrite its target.
                    if !existing.is_file() {
                        self.remove_destination(&existing).await?;
                    }
                }
            }
        }

        if !kept {
            match local {
                Some(local) => {
                    let bytes = self
                        .src()
                        .read(&local)
                        .await
                        .map_err(|e| UnitErrorKind::io(&local, e))?;
                    self.write_destination(&bytes).await?;
                }
                None => self.download(source).await?,
            }
        }

        self.apply_attributes(self.unit.file_mode).await?;
        Ok(if kept {
            UnitOutcome::Skipped
        } else {
            UnitOutcome::Transferred
        })
    }

    /// Fetch `source`, then render the fetched copy in place
    async fn download(&self, source: &Path) -> Result<()> {
        let destination = &self.unit.destination;
        let bytes = self
            .src()
            .read(source)
            .await
            .map_err(|e| UnitErrorKind::io(source, e))?;
        self.write_destination(&bytes).await?;
        if self.unit.template {
            let rendered = self.render_local(destination).await?;
            let bytes = self
                .dst()
                .read(&rendered)
                .await
                .map_err(|e| UnitErrorKind::io(&rendered, e))?;
            self.write_destination(&bytes).await?;
        }
        Ok(())
    }

    /// Path of the content to transfer: `path` itself, or its rendered copy
    /// when the unit is a template
    async fn render_local(&self, path: &Path) -> Result<PathBuf> {
        if !self.unit.template {
            return Ok(path.to_path_buf());
        }
        let handler = self
            .ctx
            .templating
            .as_ref()
            .ok_or_else(|| UnitErrorKind::NoTemplatingHandler(self.unit.source.clone()))?;
        Ok(handler.render(path).await?)
    }

    async fn write_destination(&self, bytes: &[u8]) -> Result<()> {
        let destination = &self.unit.destination;
        self.dst()
            .write(destination, bytes)
            .await
            .map_err(|e| UnitErrorKind::io(destination, e))
    }

    async fn apply_attributes(&self, mode: Option<u32>) -> Result<()> {
        let destination = &self.unit.destination;
        if let Some(mode) = mode {
            self.dst()
                .set_mode(destination, mode)
                .await
                .map_err(|e| UnitErrorKind::io(destination, e))?;
        }
        if let Some(group) = &self.unit.group {
            self.dst()
                .set_group(destination, group)
                .await
                .map_err(|e| UnitErrorKind::io(destination, e))?;
        }
        Ok(())
    }

    async fn remove_destination(&self, existing: &Metadata) -> Result<()> {
        let destination = &self.unit.destination;
        let removed = if existing.is_dir() {
            self.dst().remove_dir_all(destination).await
        } else {
            self.dst().remove_file(destination).await
        };
        removed.map_err(|e| UnitErrorKind::io(destination, e))
    }

    async fn src_metadata(&self, path: &Path) -> Result<Option<Metadata>> {
        self.src()
            .metadata(path)
            .await
            .map_err(|e| UnitErrorKind::io(path, e))
    }

    async fn dst_metadata(&self, path: &Path) -> Result<Option<Metadata>> {
        self.dst()
            .metadata(path)
            .await
            .map_err(|e| UnitErrorKind::io(path, e))
    }
}
