use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{amount::CurrencyAmount, currency::Currency, pricing::Pricer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BribeEstimate {
    pub min_bribe: CurrencyAmount,
    pub max_bribe: CurrencyAmount,
}

/// The discrete tip presets exposed to users and the margin range they span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipSettings {
    /// Bribe margin (percent) of the lowest setting.
    pub min_margin: u64,
    /// Bribe margin (percent) of the highest setting.
    pub max_margin: u64,
    pub steps: u8,
}

impl Default for TipSettings {
    fn default() -> Self {
        Self {
            min_margin: 5,
            max_margin: 50,
            steps: 4,
        }
    }
}

impl TipSettings {
    fn step_size(&self) -> u64 {
        let intervals = u64::from(self.steps.saturating_sub(1)).max(1);
        self.max_margin.saturating_sub(self.min_margin) / intervals
    }

    pub fn settings(&self) -> impl Iterator<Item = u8> {
        1..=self.steps
    }

    /// Margin percentage of a discrete setting, `None` outside `1..=steps`.
    pub fn setting_to_value(&self, setting: u8) -> Option<u64> {
        if setting == 0 || setting > self.steps {
            return None;
        }
        Some(self.step_size() * u64::from(setting - 1) + self.min_margin)
    }

    /// Nearest discrete setting to a raw margin. Ties go to the lower setting.
    pub fn value_to_setting(&self, value: u64) -> u8 {
        let mut best = (1, u64::MAX);
        for setting in self.settings() {
            let Some(candidate) = self.setting_to_value(setting) else {
                continue;
            };
            let distance = candidate.abs_diff(value);
            if distance < best.1 {
                best = (setting, distance);
            }
        }
        best.0
    }

    /// Snaps a persisted raw margin onto the margin of its nearest setting.
    pub fn reconcile(&self, value: u64) -> u64 {
        self.setting_to_value(self.value_to_setting(value))
            .unwrap_or(self.min_margin)
    }
}

#[derive(Debug, Clone)]
pub struct BribeEstimator {
    pub tips: TipSettings,
    pub native: Currency,
}

impl BribeEstimator {
    pub fn new(tips: TipSettings, native: Currency) -> Self {
        Self { tips, native }
    }

    /// `None` when the priority fee is unknown or the setting is out of range.
    pub fn estimate<P: Pricer>(
        &self,
        pricer: &P,
        priority_fee: Option<&BigUint>,
        setting: u8,
    ) -> Option<BribeEstimate> {
        let priority_fee = priority_fee?;
        let margin = self.tips.setting_to_value(setting)?;
        let estimate = pricer.estimate_bribe_amounts(&self.native, priority_fee, margin);
        trace!(
            %priority_fee,
            margin,
            min = %estimate.min_bribe,
            max = %estimate.max_bribe,
            "Estimated bribe range"
        );
        Some(estimate)
    }
}
