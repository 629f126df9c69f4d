//! # classist
//!
//! Finds the Java archives under a directory, indexes every class they
//! contain, and answers "which archives hold class X" and "which classes are
//! on the classpath more than once".
//!
//! ## Architecture
//!
//! - **filter**: Decides which filesystem entries are directories or recognised archives
//! - **archive**: Lazy class-name reader over one `.jar`/`.ear`/`.war`/... file
//! - **walker**: Iterative tree traversal with cancellation, feeding a fresh index
//! - **index**: Class name to owning archives, with duplicate detection
//! - **query**: Case-insensitive regex search and duplicates-only listing
//! - **controller**: Background scan lifecycle, state notifications, query entry point
//! - **config**: Scan options and the last-used root preference
//! - **error**: Error taxonomy shared by the modules above

pub mod archive;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod index;
pub mod query;
pub mod walker;

pub use controller::{ScanController, ScanEvent, ScanState};
pub use error::{Result, ScanError};
pub use index::ClassIndex;
pub use query::QueryMode;
