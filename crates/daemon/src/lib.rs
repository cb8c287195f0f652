//! Process-level wiring for `stirling`.
//!
//! Owns the two periodic activities and the channel between them:
//! - PWM task: drives the heater pin from the latest duty fraction
//! - Sampling task: fetches from the active source on schedule
//! - Controller loop: feeds fetch results through the ingestor

pub mod controller;
pub mod pin;
pub mod schedule;

pub use controller::{run, Controller, ControllerReport};
pub use pin::HeaterPin;
pub use schedule::{first_tick_delay, sample_loop};
