//! Desk configuration defaults.
//!
//! Every tunable has a named default. A missing value resolves to its
//! default; a value that is non-finite or negative fails closed. Parameters
//! without a default would fail closed when missing.

use std::collections::BTreeMap;
use std::time::Duration;

use sourcing_core::FinalizeConfig;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigParam {
    // External call bounds
    FxFetchTimeoutMs,
    NotifyTimeoutMs,

    // FX fallback
    FxRateMaxAgeS,

    // Notification outbox
    NotificationQueueCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config fail-closed: '{param_name}' {reason}")]
pub struct MissingConfigError {
    pub param_name: &'static str,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Missing(#[from] MissingConfigError),
    #[error("unknown config parameter '{name}'")]
    UnknownParam { name: String },
    #[error("'{param_name}' = {value} is out of range: {reason}")]
    OutOfRange {
        param_name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("config is not a JSON object of numbers: {reason}")]
    InvalidJson { reason: String },
}

/// Default for a parameter, or `None` when the parameter must be supplied.
pub fn default_value(param: ConfigParam) -> Option<f64> {
    match param {
        ConfigParam::FxFetchTimeoutMs => Some(2000.0),
        ConfigParam::NotifyTimeoutMs => Some(1000.0),
        ConfigParam::FxRateMaxAgeS => Some(86_400.0),
        ConfigParam::NotificationQueueCapacity => Some(256.0),
    }
}

pub fn param_name(param: ConfigParam) -> &'static str {
    match param {
        ConfigParam::FxFetchTimeoutMs => "fx_fetch_timeout_ms",
        ConfigParam::NotifyTimeoutMs => "notify_timeout_ms",
        ConfigParam::FxRateMaxAgeS => "fx_rate_max_age_s",
        ConfigParam::NotificationQueueCapacity => "notification_queue_capacity",
    }
}

pub fn param_from_name(name: &str) -> Option<ConfigParam> {
    ALL_PARAMS.iter().copied().find(|&p| param_name(p) == name)
}

/// Bump together with `ALL_PARAMS` when adding a variant.
pub const EXPECTED_PARAM_COUNT: usize = 4;

pub const ALL_PARAMS: &[ConfigParam] = &[
    ConfigParam::FxFetchTimeoutMs,
    ConfigParam::NotifyTimeoutMs,
    ConfigParam::FxRateMaxAgeS,
    ConfigParam::NotificationQueueCapacity,
];

/// Upper bound for the external call timeouts (10 minutes).
pub const MAX_TIMEOUT_MS: f64 = 600_000.0;

/// Explicit value wins; otherwise the default; otherwise fail closed.
pub fn resolve_config_value(
    param: ConfigParam,
    value: Option<f64>,
) -> Result<f64, MissingConfigError> {
    if let Some(v) = value {
        if !v.is_finite() {
            return Err(MissingConfigError {
                param_name: param_name(param),
                reason: "is non-finite (NaN or Infinity)",
            });
        }
        if v < 0.0 {
            return Err(MissingConfigError {
                param_name: param_name(param),
                reason: "is negative; all parameters must be non-negative",
            });
        }
        return Ok(v);
    }
    default_value(param).ok_or(MissingConfigError {
        param_name: param_name(param),
        reason: "is missing and has no default",
    })
}

// --- Resolved settings ----------------------------------------------------

/// Fully resolved desk settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskSettings {
    pub finalize: FinalizeConfig,
    /// How long a last-known-good FX rate may stand in for a failed fetch.
    pub fx_rate_max_age: Duration,
    pub notification_queue_capacity: usize,
}

impl Default for DeskSettings {
    fn default() -> Self {
        // Defaults always resolve.
        Self::from_overrides(&BTreeMap::new()).unwrap_or_else(|_| Self {
            finalize: FinalizeConfig::default(),
            fx_rate_max_age: Duration::from_secs(86_400),
            notification_queue_capacity: 256,
        })
    }
}

impl DeskSettings {
    /// Resolve every parameter from `overrides` (keyed by `param_name`).
    pub fn from_overrides(overrides: &BTreeMap<String, f64>) -> Result<Self, SettingsError> {
        if let Some(name) = overrides.keys().find(|k| param_from_name(k).is_none()) {
            return Err(SettingsError::UnknownParam { name: name.clone() });
        }
        let get = |param: ConfigParam| {
            resolve_config_value(param, overrides.get(param_name(param)).copied())
        };

        let fx_fetch_timeout_ms = get(ConfigParam::FxFetchTimeoutMs)?;
        let notify_timeout_ms = get(ConfigParam::NotifyTimeoutMs)?;
        let fx_rate_max_age_s = get(ConfigParam::FxRateMaxAgeS)?;
        let capacity = get(ConfigParam::NotificationQueueCapacity)?;

        if fx_fetch_timeout_ms < 1.0 {
            return Err(SettingsError::OutOfRange {
                param_name: param_name(ConfigParam::FxFetchTimeoutMs),
                value: fx_fetch_timeout_ms,
                reason: "timeout must be at least 1ms",
            });
        }
        for (param, value) in [
            (ConfigParam::FxFetchTimeoutMs, fx_fetch_timeout_ms),
            (ConfigParam::NotifyTimeoutMs, notify_timeout_ms),
        ] {
            if value > MAX_TIMEOUT_MS {
                return Err(SettingsError::OutOfRange {
                    param_name: param_name(param),
                    value,
                    reason: "timeout must not exceed 600000ms",
                });
            }
        }
        let fx_rate_max_age = Duration::try_from_secs_f64(fx_rate_max_age_s).map_err(|_| {
            SettingsError::OutOfRange {
                param_name: param_name(ConfigParam::FxRateMaxAgeS),
                value: fx_rate_max_age_s,
                reason: "age does not fit in a duration",
            }
        })?;
        if capacity < 1.0 || capacity.fract() != 0.0 {
            return Err(SettingsError::OutOfRange {
                param_name: param_name(ConfigParam::NotificationQueueCapacity),
                value: capacity,
                reason: "capacity must be a positive whole number",
            });
        }

        Ok(Self {
            finalize: FinalizeConfig {
                fx_fetch_timeout: Duration::from_millis(fx_fetch_timeout_ms as u64),
                notify_timeout: Duration::from_millis(notify_timeout_ms as u64),
            },
            fx_rate_max_age,
            notification_queue_capacity: capacity as usize,
        })
    }

    /// Parse a flat JSON object such as `{"notify_timeout_ms": 500}`.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let overrides: BTreeMap<String, f64> =
            serde_json::from_str(json).map_err(|e| SettingsError::InvalidJson {
                reason: e.to_string(),
            })?;
        Self::from_overrides(&overrides)
    }
}
