//! User preferences that outlive a session: tip margin, slippage, hop policy and deadline.
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::eyre::{self, WrapErr as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{amount::Percent, bribe::TipSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Raw bribe margin in percent. Snapped to a tip step on load.
    pub tip_margin: u64,
    pub slippage_bps: u64,
    pub single_hop_only: bool,
    #[serde(with = "crate::config::humantime_str")]
    pub deadline: Duration,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            tip_margin: TipSettings::default().min_margin,
            slippage_bps: 50,
            single_hop_only: false,
            deadline: Duration::from_secs(20 * 60),
        }
    }
}

impl Preferences {
    pub fn slippage(&self) -> Percent {
        Percent::from_bps(self.slippage_bps)
    }

    /// Discrete tip setting closest to the stored margin.
    pub fn tip_setting(&self, tips: &TipSettings) -> u8 {
        tips.value_to_setting(self.tip_margin)
    }

    pub fn set_tip_setting(&mut self, tips: &TipSettings, setting: u8) -> eyre::Result<()> {
        self.tip_margin = tips
            .setting_to_value(setting)
            .ok_or_else(|| eyre::eyre!("tip setting {setting} outside 1..={}", tips.steps))?;
        Ok(())
    }

    /// Snaps a margin written under different tip bounds onto the current steps.
    pub fn reconcile(&mut self, tips: &TipSettings) -> bool {
        let reconciled = tips.reconcile(self.tip_margin);
        let changed = reconciled != self.tip_margin;
        if changed {
            info!(
                stored = self.tip_margin,
                reconciled, "Reconciled stored tip margin to a valid step"
            );
            self.tip_margin = reconciled;
        }
        changed
    }
}

/// Read at startup, written on change.
pub trait PreferenceStore {
    fn load(&self) -> eyre::Result<Option<Preferences>>;
    fn save(&self, preferences: &Preferences) -> eyre::Result<()>;
}

/// Loads preferences, falling back to defaults, and reconciles the tip margin. A reconciled
/// margin is written back.
pub fn load_reconciled<S: PreferenceStore>(
    store: &S,
    tips: &TipSettings,
) -> eyre::Result<Preferences> {
    let mut preferences = store.load()?.unwrap_or_default();
    if preferences.reconcile(tips) {
        store.save(&preferences)?;
    }
    Ok(preferences)
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&self) -> eyre::Result<Option<Preferences>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored preferences");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| {
                    format!("failed to read preferences from {}", self.path.display())
                });
            }
        };
        let preferences = serde_json::from_str(&raw).wrap_err("failed to parse preferences")?;
        Ok(Some(preferences))
    }

    fn save(&self, preferences: &Preferences) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).wrap_err("failed to create preferences directory")?;
        }
        let raw = serde_json::to_string_pretty(preferences)
            .wrap_err("failed to serialize preferences")?;
        fs::write(&self.path, raw).wrap_err_with(|| {
            format!("failed to write preferences to {}", self.path.display())
        })
    }
}
