//! Hierarchical attendance report engine.
//!
//! Picks a root group and a filter, lazily expands the group hierarchy, and
//! lets every visible node fetch and aggregate its own attendance counts into
//! a dense date × time-slot × status grid.

pub mod config;
pub mod dates;
pub mod error;
pub mod lookup;
pub mod models;
pub mod query;
pub mod registry;
pub mod render;
pub mod row;
pub mod session;
pub mod source;
pub mod tree;

pub use config::ClientConfig;
pub use error::{ReportError, Result};
pub use query::{QueryPatch, ReportQueryState};
pub use session::{FetchKind, ReportSession};
pub use source::{HttpReportSource, ReportSource};
