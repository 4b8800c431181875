//! Operations the bulk executor applies over an id set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum BulkOperation {
    SoftDelete,
    Restore,
    ForceDelete,
    SetStatus(bool),
}

impl BulkOperation {
    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
            Self::ForceDelete => "force_delete",
            Self::SetStatus(true) => "activate",
            Self::SetStatus(false) => "deactivate",
        }
    }
}
