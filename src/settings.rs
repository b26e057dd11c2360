use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::timer::{DEFAULT_POUR_INCREMENTS, DEFAULT_TICK_INTERVAL};

const DEBUG_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrewSettings {
    /// Quick-adjust amounts offered while entering a pour, in grams.
    pub pour_increments: Vec<f64>,
    pub tick_interval_ms: u64,
}

impl Default for BrewSettings {
    fn default() -> Self {
        Self {
            pour_increments: DEFAULT_POUR_INCREMENTS.to_vec(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

impl BrewSettings {
    /// Display tick for the brew timer. `BREWLOG_DEBUG` slows it to once a
    /// second so log output stays readable.
    pub fn tick_interval(&self) -> Duration {
        if std::env::var("BREWLOG_DEBUG").is_ok() {
            return DEBUG_TICK_INTERVAL;
        }
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Increments must be non-empty, finite and non-zero.
pub fn validate_pour_increments(increments: &[f64]) -> Result<()> {
    if increments.is_empty() {
        bail!("at least one pour increment is required");
    }
    if let Some(bad) = increments
        .iter()
        .find(|step| !step.is_finite() || **step == 0.0)
    {
        bail!("invalid pour increment {bad}; increments must be non-zero numbers");
    }
    Ok(())
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<BrewSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            BrewSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> BrewSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: BrewSettings) -> Result<()> {
        validate_pour_increments(&settings.pour_increments)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &BrewSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
