//! Per-unit outcomes of a run

use crate::job::UnitOutcome;
use std::path::PathBuf;

/// Outcome of one unit that ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub outcome: UnitOutcome,
}

/// Outcomes of the units that ended without error, in completion order.
///
/// Returned by a successful run, and carried by the error of a failed,
/// critical or interrupted one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub units: Vec<UnitReport>,
}

impl TransferReport {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn count(&self, outcome: UnitOutcome) -> usize {
        self.units.iter().filter(|u| u.outcome == outcome).count()
    }

    pub fn transferred(&self) -> usize {
        self.count(UnitOutcome::Transferred)
    }

    pub fn skipped(&self) -> usize {
        self.count(UnitOutcome::Skipped)
    }

    pub fn missing(&self) -> usize {
        self.count(UnitOutcome::SourceMissing)
    }

    /// Whether `destination` ended without error
    pub fn contains(&self, destination: &std::path::Path) -> bool {
        self.units.iter().any(|u| u.destination == destination)
    }
}

impl std::fmt::Display for TransferReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} transferred, {} skipped, {} missing",
            self.transferred(),
            self.skipped(),
            self.missing()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, outcome: UnitOutcome) -> UnitReport {
        UnitReport {
            source: PathBuf::from("/src").join(name),
            destination: PathBuf::from("/dst").join(name),
            outcome,
        }
    }

    #[test]
    fn test_report_counts_outcomes() {
        let report = TransferReport {
            units: vec![
                unit("a", UnitOutcome::Transferred),
                unit("b", UnitOutcome::Skipped),
                unit("c", UnitOutcome::Transferred),
                unit("d", UnitOutcome::SourceMissing),
            ],
        };
        assert_eq!(report.len(), 4);
        assert_eq!(report.to_string(), "2 transferred, 1 skipped, 1 missing");
        assert!(report.contains(std::path::Path::new("/dst/b")));
        assert!(!report.contains(std::path::Path::new("/dst/z")));
    }
}
