//! Converge Transfer
//!
//! Moves sets of files between two filesystems with bounded concurrency:
//! resource specifications are resolved into transfer units, and the
//! [`TransferEngine`] processes them on a small worker pool, honoring each
//! unit's link option, overwrite behavior, permissions, group and templating.
//!
//! ```text
//! ResourcesSpecification ──resolve──▶ [TransferUnit] ──▶ TransferEngine
//!                                                          │  ▲
//!                                         FileSystem (src) ┘  └ FileSystem (dst)
//! ```

pub mod engine;
pub mod error;
pub mod fs;
mod job;
pub mod report;
pub mod resolver;
pub mod template;
pub mod unit;

pub use engine::{RunState, TransferEngine};
pub use error::{
    Cause, ConsolidatedError, Result, TemplatingError, TransferError, UnitError, UnitErrorKind,
};
pub use fs::{EntryKind, FileSystem, LocalFileSystem, Metadata};
pub use job::UnitOutcome;
pub use report::{TransferReport, UnitReport};
pub use resolver::{ResourcesSpecification, resolve_all};
pub use template::{TemplatingHandler, TeraTemplating, Variables};
pub use unit::{Direction, GroupId, LinkOption, TransferBehavior, TransferUnit};
