use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin, PinState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Linux sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Error from a pin write, carrying the underlying cause.
#[derive(Debug)]
pub struct PinError(pub String);

impl std::fmt::Display for PinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PinError {}

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

// ── Sysfs ─────────────────────────────────────────────────────────────────────

/// A BCM GPIO line driven through `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    root:   PathBuf,
}

impl SysfsPin {
    /// Export `number` under the default sysfs root and configure it as an output.
    pub fn open(number: u32) -> Result<Self, PinError> {
        Self::open_at(SYSFS_GPIO_ROOT, number)
    }

    /// Same as [`SysfsPin::open`] with an explicit sysfs root.
    pub fn open_at(root: impl AsRef<Path>, number: u32) -> Result<Self, PinError> {
        let root = root.as_ref().to_path_buf();
        let pin = Self { number, root };

        if !pin.dir().exists() {
            write_attr(&pin.root.join("export"), &number.to_string())?;
            debug!("Exported GPIO {number}");
        }
        write_attr(&pin.dir().join("direction"), "out")?;

        Ok(pin)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    fn dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.number))
    }
}

impl ErrorType for SysfsPin {
    type Error = PinError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        write_attr(&self.dir().join("value"), "0")
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        write_attr(&self.dir().join("value"), "1")
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if let Err(e) = self.set_low() {
            warn!("GPIO {}: final low write failed: {e}", self.number);
        }
        let _ = std::fs::write(self.root.join("unexport"), self.number.to_string());
    }
}

fn write_attr(path: &Path, value: &str) -> Result<(), PinError> {
    std::fs::write(path, value).map_err(|e| PinError(format!("write '{}': {e}", path.display())))
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// One recorded level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at:    Instant,
    pub level: PinState,
}

/// Shared view of everything written to a [`MemoryPin`].
#[derive(Debug, Clone, Default)]
pub struct PinLog(Arc<Mutex<Vec<Transition>>>);

impl PinLog {
    pub fn transitions(&self) -> Vec<Transition> {
        self.lock().clone()
    }

    /// Last level written, `None` if the pin was never driven.
    pub fn level(&self) -> Option<PinState> {
        self.lock().last().map(|t| t.level)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Transition>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A pin that only records what it is told. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryPin {
    log:       PinLog,
    writes:    usize,
    fail_from: Option<usize>,
}

impl MemoryPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write from the `n`th (zero-based) onwards fails.
    pub fn failing_from(n: usize) -> Self {
        Self { fail_from: Some(n), ..Self::default() }
    }

    pub fn log(&self) -> PinLog {
        self.log.clone()
    }

    fn write(&mut self, level: PinState) -> Result<(), PinError> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_from.is_some_and(|n| index >= n) {
            return Err(PinError(format!("injected failure on write {index}")));
        }
        self.log.lock().push(Transition { at: Instant::now(), level });
        Ok(())
    }
}

impl ErrorType for MemoryPin {
    type Error = PinError;
}

impl OutputPin for MemoryPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(PinState::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(PinState::High)
    }
}
