//! Core types for the attendance client.
//!
//! Value types shared by the live feed, the reconciler, and the REST client.

pub mod person;
pub mod primitives;
pub mod status;
pub mod summary;

pub use person::{PageMeta, PersonRecord, PersonsPage};
pub use primitives::{ClientIdentity, Timestamp};
pub use status::{PersonStatus, StatusMap};
pub use summary::DailySummary;
