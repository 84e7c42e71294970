//! Transfer units and their policies

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which side of the transfer is local
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// local source, remote destination
    Upload,
    /// remote source, local destination
    Download,
}

/// How symbolic links found on the source are transferred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkOption {
    /// Recreate the link as-is
    KeepLinks,
    /// Transfer what the link points to
    CopyLinks,
    /// Keep links pointing inside the transfer root, copy the others
    #[default]
    CopyUnsafeLinks,
}

impl FromStr for LinkOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-links" => Ok(LinkOption::KeepLinks),
            "copy-links" => Ok(LinkOption::CopyLinks),
            "copy-unsafe-links" => Ok(LinkOption::CopyUnsafeLinks),
            other => Err(format!(
                "unknown link option '{}' (expected keep-links, copy-links or copy-unsafe-links)",
                other
            )),
        }
    }
}

/// What to do when the destination file already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferBehavior {
    #[default]
    ForceOverwrite,
    SkipIfExists,
    FailIfExists,
}

impl FromStr for TransferBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "force-overwrite" => Ok(TransferBehavior::ForceOverwrite),
            "skip-if-exists" => Ok(TransferBehavior::SkipIfExists),
            "fail-if-exists" => Ok(TransferBehavior::FailIfExists),
            other => Err(format!(
                "unknown transfer behavior '{}' (expected force-overwrite, skip-if-exists or fail-if-exists)",
                other
            )),
        }
    }
}

/// Owning group, numeric or by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupId {
    Gid(u32),
    Name(String),
}

impl FromStr for GroupId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("a group cannot be empty".to_string());
        }
        Ok(match s.parse::<u32>() {
            Ok(gid) => GroupId::Gid(gid),
            Err(_) => GroupId::Name(s.to_string()),
        })
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupId::Gid(gid) => write!(f, "{}", gid),
            GroupId::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One filesystem entry to move.
///
/// The entry kind is not stored: it is observed on the source filesystem
/// when the unit is processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferUnit {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Tree the source belongs to; a link resolving outside of it is unsafe
    pub transfer_root: PathBuf,
    pub file_mode: Option<u32>,
    pub dir_mode: Option<u32>,
    pub group: Option<GroupId>,
    pub template: bool,
    pub link_option: LinkOption,
    pub behavior: TransferBehavior,
}

impl TransferUnit {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        transfer_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            transfer_root: transfer_root.into(),
            file_mode: None,
            dir_mode: None,
            group: None,
            template: false,
            link_option: LinkOption::default(),
            behavior: TransferBehavior::default(),
        }
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = Some(mode);
        self
    }

    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_template(mut self, template: bool) -> Self {
        self.template = template;
        self
    }

    pub fn with_link_option(mut self, link_option: LinkOption) -> Self {
        self.link_option = link_option;
        self
    }

    pub fn with_behavior(mut self, behavior: TransferBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Whether a link at `self.source` pointing to `target` stays inside the
    /// transfer root. Relative targets resolve against the link's directory.
    pub fn is_safe_link_target(&self, target: &Path) -> bool {
        let resolved = if target.is_absolute() {
            normalize(target)
        } else {
            let parent = self.source.parent().unwrap_or(Path::new(""));
            normalize(&parent.join(target))
        };
        resolved.starts_with(normalize(&self.transfer_root))
    }
}

impl std::fmt::Display for TransferUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.source.display(),
            self.destination.display()
        )
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the
/// filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
