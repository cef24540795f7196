//! Daily attendance summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::primitives::Timestamp;

/// Aggregate attendance counts for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Day the summary covers.
    pub date: Timestamp,

    /// Persons with an attendance record for the day.
    pub total_persons: u32,

    /// Present count.
    pub present: u32,

    /// Absent count.
    pub absent: u32,

    /// Late count.
    pub late: u32,

    /// Early leave count.
    pub early_leave: u32,

    /// Present persons as a percentage of the total.
    pub presence_percentage: f64,

    /// Record count per raw status value.
    #[serde(default)]
    pub status_breakdown: BTreeMap<String, u32>,
}

impl DailySummary {
    /// Returns true if no records exist for the day.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_persons == 0
    }
}
