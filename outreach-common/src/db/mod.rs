//! SQLite lead store
//!
//! One database file holds everything the pipeline knows: leads, the
//! persisted dispatch schedule, harvest keywords, and daily send/upload
//! quotas. Nested lead structures are stored as JSON in TEXT columns.

pub mod init;
pub mod keywords;
pub mod leads;
pub mod quota;
pub mod schedule;

pub use init::init_store;
pub use schedule::ScheduleEntry;
