use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stirling_core::Range;

/// Root configuration structure parsed from `stirling.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StirlingConfig {
    /// Key into `sources` selecting the active data source. Required.
    pub data_type: Option<String>,
    /// `[min, max]` duty fraction. `min` keeps the engine idling, `max` keeps
    /// it from over-revving.
    pub duty: [f64; 2],
    /// Length of one PWM period in milliseconds.
    pub pwm_interval_ms: u64,
    /// BCM GPIO number of the heater output (18 is physical pin 12).
    pub heater_pin: u32,
    pub pin_backend: PinBackend,
    pub display: DisplayKind,
    /// Known data sources keyed by name, e.g. `"wind"`.
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Default for StirlingConfig {
    fn default() -> Self {
        Self {
            data_type:       None,
            duty:            [0.2, 0.7],
            pwm_interval_ms: 2_000,
            heater_pin:      18,
            pin_backend:     PinBackend::Sysfs,
            display:         DisplayKind::None,
            sources:         BTreeMap::new(),
        }
    }
}

/// How the heater pin is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PinBackend {
    /// Linux `/sys/class/gpio`.
    #[default]
    Sysfs,
    /// Record writes in memory only (dry run).
    Memory,
}

/// Optional readout of each accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    #[default]
    None,
    /// Text bar gauge written to the log.
    Gauge,
}

/// One data source block, `[sources.<name>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint returning JSON. Required. `${VAR}` is expanded from the environment.
    pub url: Option<String>,
    /// Initial guess for the measurement range; widens as data arrives.
    pub min_max: Range,
    /// Running-average window.
    pub samples_to_average: usize,
    /// Seconds between samples.
    pub data_interval: u64,
    pub schedule: Schedule,
    pub extract: Extract,
    pub auth: Option<AuthConfig>,
    pub sink: Option<SinkConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url:                None,
            min_max:            Range::new(0.0, 10.0),
            samples_to_average: 1,
            data_interval:      60,
            schedule:           Schedule::Interval,
            extract:            Extract::default(),
            auth:               None,
            sink:               None,
        }
    }
}

/// When sampling ticks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Immediately at startup, then every `data_interval` seconds.
    #[default]
    Interval,
    /// On wall-clock multiples of `data_interval` (e.g. every full minute).
    Aligned,
}

/// How a JSON response becomes a single measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Extract {
    /// Number at a JSON pointer, e.g. `/obs/0/wind_gust`.
    Field { pointer: String },
    /// Count elements of the array at `array` whose `field` is truthy, or
    /// equal to `equals` when given.
    Count {
        array:  String,
        field:  String,
        #[serde(default)]
        equals: Option<String>,
    },
}

impl Default for Extract {
    /// The whole response body is the number.
    fn default() -> Self {
        Self::Field { pointer: String::new() }
    }
}

/// Credentials attached to each fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AuthConfig {
    Basic {
        #[serde(default)]
        username: String,
        password: String,
    },
    Bearer { token: String },
}

/// Downstream forwarder for accepted samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Append endpoint. `${VAR}` is expanded from the environment.
    pub url: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "text/plain".to_string()
}
