//! Heater output: pin abstraction and the software PWM loop.

pub mod driver;
pub mod pin;

pub use driver::{pulse_widths, PwmDriver, PwmReport, PwmState};
pub use pin::{MemoryPin, PinError, PinLog, SysfsPin, Transition};
