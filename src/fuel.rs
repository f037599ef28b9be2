//! Dead-reckoned fuel remaining.
//!
//! Nothing on the device measures fuel: the level is set over BLE and
//! burned down at the configured rate for every whole second the fix
//! reports motion.

use crate::config::{
    DEFAULT_BURN_RATE_LPH, DEFAULT_FUEL_LEVEL_L, MAX_BURN_RATE_LPH, MAX_FUEL_LEVEL_L,
};

/// Fuel level and burn rate.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FuelModel {
    pub level_liters: f64,
    pub burn_rate_lph: f64,
}

impl Default for FuelModel {
    fn default() -> Self {
        Self {
            level_liters: DEFAULT_FUEL_LEVEL_L,
            burn_rate_lph: DEFAULT_BURN_RATE_LPH,
        }
    }
}

impl FuelModel {
    /// Level accepted from storage or a remote command: (0, 100] litres.
    pub fn level_in_range(level: f64) -> bool {
        level > 0.0 && level <= MAX_FUEL_LEVEL_L
    }

    /// Burn rate accepted from storage or a remote command: (0, 10] L/h.
    pub fn rate_in_range(rate: f64) -> bool {
        rate > 0.0 && rate <= MAX_BURN_RATE_LPH
    }

    /// Validate-or-default for values read back from flash.
    pub fn from_stored(level: f64, rate: f64) -> Self {
        let defaults = Self::default();
        Self {
            level_liters: if Self::level_in_range(level) {
                level
            } else {
                log_warn!("stored fuel level invalid, using default");
                defaults.level_liters
            },
            burn_rate_lph: if Self::rate_in_range(rate) {
                rate
            } else {
                log_warn!("stored burn rate invalid, using default");
                defaults.burn_rate_lph
            },
        }
    }

    /// Burn one second worth of fuel.
    pub fn burn_one_second(&mut self) {
        self.level_liters = (self.level_liters - self.burn_rate_lph / 3600.0).max(0.0);
    }
}

/// Counts whole seconds of motion and burns fuel for each.
#[derive(Default)]
pub struct FuelEstimator {
    motion_since_ms: Option<u64>,
}

impl FuelEstimator {
    pub const fn new() -> Self {
        Self {
            motion_since_ms: None,
        }
    }

    /// Advance to `now_ms`. Returns the number of seconds burned.
    pub fn tick(&mut self, fuel: &mut FuelModel, moving: bool, now_ms: u64) -> u32 {
        if !moving {
            self.motion_since_ms = None;
            return 0;
        }

        let since = *self.motion_since_ms.get_or_insert(now_ms);
        let mut burned = 0;
        let mut mark = since;
        while now_ms.saturating_sub(mark) >= 1_000 {
            fuel.burn_one_second();
            mark += 1_000;
            burned += 1;
        }
        self.motion_since_ms = Some(mark);
        burned
    }
}
