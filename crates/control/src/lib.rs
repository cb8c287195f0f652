//! Duty-cycle control core: adaptive range, running average, affine duty
//! mapping and the ingestor that ties them to one data source.

pub mod display;
pub mod duty;
pub mod history;
pub mod ingest;
pub mod range;
pub mod source;

pub use display::{Display, GaugeDisplay, NoDisplay};
pub use duty::{map_duty, DutyMapper};
pub use history::HistoryBuffer;
pub use ingest::{IngestStats, SampleIngestor};
pub use range::RangeTracker;
pub use source::{DataSource, Sink};
