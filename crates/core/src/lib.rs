pub mod error;
pub mod event;
pub mod state;

pub use error::{Result, StirlingError};
pub use event::ControlEvent;
pub use state::{DutyRange, Measurement, Range, SampleRecord};
