//! Student progress entries.
//!
//! This crate holds the storage-independent parts of the progress log: the
//! entry model, request validation and the equality filters used when
//! listing entries. Persistence and HTTP live in `progresslog-cli`.

pub mod entry;
pub mod filter;
pub mod validate;

pub use entry::{NewEntry, ProgressEntry, Status, CSV_HEADERS, REQUIRED_FIELDS};
pub use filter::LogFilter;
pub use validate::{is_known_status, validate_entry, ValidationError};
