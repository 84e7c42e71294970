//! Resource resolution
//!
//! Turns declarative resource specifications (base directory + glob pattern
//! + attributes) into concrete transfer units.

use crate::error::{Result, TransferError};
use crate::unit::{GroupId, LinkOption, TransferBehavior, TransferUnit};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesSpecification {
    /// Directory the pattern is matched in; also the transfer root
    pub base_dir: PathBuf,
    /// Glob pattern, relative to `base_dir`
    pub pattern: String,
    /// Directory the matches are transferred into
    pub destination: PathBuf,
    #[serde(default)]
    pub file_mode: Option<u32>,
    #[serde(default)]
    pub dir_mode: Option<u32>,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub template: bool,
    #[serde(default)]
    pub link_option: LinkOption,
    #[serde(default)]
    pub transfer_behavior: TransferBehavior,
}

impl ResourcesSpecification {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        pattern: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            pattern: pattern.into(),
            destination: destination.into(),
            file_mode: None,
            dir_mode: None,
            group: None,
            template: false,
            link_option: LinkOption::default(),
            transfer_behavior: TransferBehavior::default(),
        }
    }

    /// Match the pattern and build one unit per matched entry, in path order
    pub fn resolve(&self) -> Result<Vec<TransferUnit>> {
        let fail = |message: String| TransferError::Resolution {
            base_dir: self.base_dir.clone(),
            pattern: self.pattern.clone(),
            message,
        };

        let base = self
            .base_dir
            .to_str()
            .ok_or_else(|| fail("the base directory is not valid UTF-8".to_string()))?;
        let full = format!("{}/{}", Pattern::escape(base.trim_end_matches('/')), self.pattern);
        let options = MatchOptions {
            require_literal_leading_dot: false,
            ..MatchOptions::new()
        };

        let mut units = Vec::new();
        for entry in glob::glob_with(&full, options).map_err(|e| fail(e.to_string()))? {
            let path = entry.map_err(|e| fail(e.to_string()))?;
            let relative = match path.strip_prefix(&self.base_dir) {
                Ok(relative) if relative != Path::new("") => relative.to_path_buf(),
                _ => continue,
            };
            units.push(self.unit(path, relative));
        }

        debug!(
            base_dir = %self.base_dir.display(),
            pattern = %self.pattern,
            count = units.len(),
            "Resolved resources"
        );
        Ok(units)
    }

    fn unit(&self, source: PathBuf, relative: PathBuf) -> TransferUnit {
        TransferUnit {
            destination: self.destination.join(relative),
            source,
            transfer_root: self.base_dir.clone(),
            file_mode: self.file_mode,
            dir_mode: self.dir_mode,
            group: self.group.clone(),
            template: self.template,
            link_option: self.link_option,
            behavior: self.transfer_behavior,
        }
    }
}

/// Resolve several specifications into one unit list.
///
/// When two specifications produce the same destination, the later one wins.
pub fn resolve_all(specs: &[ResourcesSpecification]) -> Result<Vec<TransferUnit>> {
    let mut units: Vec<TransferUnit> = Vec::new();
    for spec in specs {
        let resolved = spec.resolve()?;
        let overridden: HashSet<&Path> = resolved.iter().map(|u| u.destination.as_path()).collect();
        units.retain(|u| !overridden.contains(u.destination.as_path()));
        units.extend(resolved);
    }
    Ok(units)
}
