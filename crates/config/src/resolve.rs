use crate::schema::{AuthConfig, DisplayKind, Extract, PinBackend, Schedule, StirlingConfig};
use std::time::Duration;
use stirling_core::{DutyRange, Range, Result, StirlingError};

/// Fully validated settings for one controller run.
///
/// Only this form is accepted by the controller, so a loop can never start
/// with an unresolved source or duty range.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub source:           ResolvedSource,
    pub duty:             DutyRange,
    pub pwm_interval:     Duration,
    pub heater_pin:       u32,
    pub pin_backend:      PinBackend,
    pub display:          DisplayKind,
    pub initial_range:    Range,
    pub history_capacity: usize,
    pub sample_every:     Duration,
    pub schedule:         Schedule,
}

/// The active source with environment references expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub id:      String,
    pub url:     String,
    pub extract: Extract,
    pub auth:    Option<AuthConfig>,
    pub sink:    Option<ResolvedSink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSink {
    pub url:          String,
    pub content_type: String,
}

impl StirlingConfig {
    /// Validate against the process environment.
    pub fn resolve(&self) -> Result<ControllerConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Validate, looking up `${VAR}` references through `env`.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ControllerConfig> {
        let id = self
            .data_type
            .as_deref()
            .ok_or_else(|| StirlingError::Config("'data_type' is not set".into()))?;
        let source = self
            .sources
            .get(id)
            .ok_or_else(|| StirlingError::Config(format!("no [sources.{id}] block")))?;
        let url = source
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| StirlingError::Config(format!("sources.{id}.url is required")))?;

        let duty = DutyRange::new(self.duty[0], self.duty[1]).ok_or_else(|| {
            StirlingError::Config(format!(
                "duty {:?} must satisfy 0 <= min < max <= 1",
                self.duty
            ))
        })?;
        if self.pwm_interval_ms == 0 {
            return Err(StirlingError::Config("pwm_interval_ms must be > 0".into()));
        }
        if source.samples_to_average == 0 {
            return Err(StirlingError::Config(format!(
                "sources.{id}.samples_to_average must be >= 1"
            )));
        }
        if source.data_interval == 0 {
            return Err(StirlingError::Config(format!(
                "sources.{id}.data_interval must be > 0"
            )));
        }
        if !source.min_max.low.is_finite() || !source.min_max.high.is_finite() {
            return Err(StirlingError::Config(format!(
                "sources.{id}.min_max must be finite"
            )));
        }

        let auth = match &source.auth {
            None => None,
            Some(AuthConfig::Basic { username, password }) => Some(AuthConfig::Basic {
                username: expand_env(username, &env)?,
                password: expand_env(password, &env)?,
            }),
            Some(AuthConfig::Bearer { token }) => Some(AuthConfig::Bearer {
                token: expand_env(token, &env)?,
            }),
        };
        let sink = source
            .sink
            .as_ref()
            .map(|s| {
                Ok::<_, StirlingError>(ResolvedSink {
                    url:          expand_env(&s.url, &env)?,
                    content_type: s.content_type.clone(),
                })
            })
            .transpose()?;

        Ok(ControllerConfig {
            source: ResolvedSource {
                id: id.to_string(),
                url: expand_env(url, &env)?,
                extract: source.extract.clone(),
                auth,
                sink,
            },
            duty,
            pwm_interval: Duration::from_millis(self.pwm_interval_ms),
            heater_pin: self.heater_pin,
            pin_backend: self.pin_backend,
            display: self.display,
            initial_range: source.min_max,
            history_capacity: source.samples_to_average,
            sample_every: Duration::from_secs(source.data_interval),
            schedule: source.schedule,
        })
    }
}

/// Replace every `${NAME}` in `raw` with its value from `env`.
///
/// An unset variable or an unterminated `${` is a configuration error.
pub fn expand_env(raw: &str, env: impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| StirlingError::Config(format!("unterminated '${{' in '{raw}'")))?;
        let name = &after[..end];
        let value = env(name).ok_or_else(|| {
            StirlingError::Config(format!("environment variable '{name}' is not set"))
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
