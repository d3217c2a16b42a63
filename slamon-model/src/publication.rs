use std::fmt;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies which scheduled model run a dataset belongs to.
///
/// This is the analysis time encoded in the dataset name, not the time the
/// file was written or fetched. Publications order by that timestamp alone.
/// "Nothing observed yet" is modelled as `Option<Publication>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Publication(DateTime<Utc>);

impl Publication {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Human readable form used in board messages, e.g. `2024-03-01 06 UTC`.
    pub fn bulletin_label(&self) -> String {
        self.0.format("%Y-%m-%d %H UTC").to_string()
    }
}

impl From<DateTime<Utc>> for Publication {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }
}

impl fmt::Display for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%MZ"))
    }
}
