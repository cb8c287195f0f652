use embedded_hal::digital::{ErrorType, OutputPin};
use stirling_config::PinBackend;
use stirling_core::{Result, StirlingError};
use stirling_pwm::{MemoryPin, PinError, SysfsPin};

/// The heater output selected by `pin_backend`.
#[derive(Debug)]
pub enum HeaterPin {
    Sysfs(SysfsPin),
    Memory(MemoryPin),
}

impl HeaterPin {
    /// Open the configured backend. Failing to claim the GPIO is a startup error.
    pub fn open(backend: PinBackend, number: u32) -> Result<Self> {
        match backend {
            PinBackend::Sysfs => SysfsPin::open(number)
                .map(Self::Sysfs)
                .map_err(|e| StirlingError::Config(format!("GPIO {number}: {e}"))),
            PinBackend::Memory => Ok(Self::Memory(MemoryPin::new())),
        }
    }
}

impl ErrorType for HeaterPin {
    type Error = PinError;
}

impl OutputPin for HeaterPin {
    fn set_low(&mut self) -> std::result::Result<(), Self::Error> {
        match self {
            Self::Sysfs(p) => p.set_low(),
            Self::Memory(p) => p.set_low(),
        }
    }

    fn set_high(&mut self) -> std::result::Result<(), Self::Error> {
        match self {
            Self::Sysfs(p) => p.set_high(),
            Self::Memory(p) => p.set_high(),
        }
    }
}
