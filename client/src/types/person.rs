//! Person listing types.

use serde::{Deserialize, Serialize};

/// A person as returned by the persons listing.
///
/// Only the fields needed to seed status snapshots are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Person ID.
    pub id: String,

    /// First name.
    pub first_name: String,

    /// Last name.
    pub last_name: String,

    /// Department.
    #[serde(default)]
    pub department: Option<String>,

    /// Record status (active, inactive, deleted).
    #[serde(default)]
    pub status: Option<String>,
}

impl PersonRecord {
    /// Returns "first last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Returns true unless the record is marked inactive or deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "active")
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number (1-based).
    pub page: u32,

    /// Items per page.
    #[serde(rename = "pageSize")]
    pub page_size: u32,

    /// Total items.
    pub total: u32,

    /// Total pages.
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

impl PageMeta {
    /// Returns true if a page follows this one.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One page of the persons listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonsPage {
    /// Persons on this page.
    pub persons: Vec<PersonRecord>,

    /// Pagination metadata.
    pub meta: PageMeta,
}
