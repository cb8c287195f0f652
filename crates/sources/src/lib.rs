//! Data source and sink collaborators backed by HTTP.

pub mod extract;
pub mod http;

pub use extract::extract;
pub use http::{csv_line, HttpAppendSink, HttpSource};
