use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a project or stock record.
///
/// Records start at `Stage1` (intake), move to `Stage2` once delivery details
/// arrive and end at `Completed`, which only a caller can set explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Stage1,
    Stage2,
    Completed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Stage1 => "stage1",
            Stage::Stage2 => "stage2",
            Stage::Completed => "completed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Stage::Stage1 => 1,
            Stage::Stage2 => 2,
            Stage::Completed => 3,
        }
    }

    /// Status never moves backwards and nothing leaves `Completed`.
    pub fn can_move_to(self, next: Stage) -> bool {
        next.rank() >= self.rank()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which aggregate a record belongs to. Both kinds share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Project,
    Stock,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Project => "project",
            Kind::Stock => "stock",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kind::Project => "Project",
            Kind::Stock => "Stock",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Stage;

    #[test]
    fn test_forward_moves() {
        assert!(Stage::Stage1.can_move_to(Stage::Stage2));
        assert!(Stage::Stage1.can_move_to(Stage::Completed));
        assert!(Stage::Stage2.can_move_to(Stage::Completed));
        assert!(Stage::Stage2.can_move_to(Stage::Stage2));
    }

    #[test]
    fn test_no_regression() {
        assert!(!Stage::Stage2.can_move_to(Stage::Stage1));
        assert!(!Stage::Completed.can_move_to(Stage::Stage2));
        assert!(!Stage::Completed.can_move_to(Stage::Stage1));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Stage::Stage1).unwrap(), "\"stage1\"");
        assert_eq!(
            serde_json::from_str::<Stage>("\"completed\"").unwrap(),
            Stage::Completed
        );
    }
}
