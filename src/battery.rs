//! Battery level from the sense divider.
//!
//! The ADC sees half of the cell voltage. Percentages map the sense
//! voltage linearly between the empty and full thresholds.

use crate::config::{BATTERY_DIVIDER, BATTERY_EMPTY_MV, BATTERY_FULL_MV};

/// One averaged battery reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    /// Millivolts at the ADC pin.
    pub sense_mv: u32,
}

impl BatteryReading {
    /// Average a batch of millivolt samples. `None` for an empty batch.
    pub fn from_samples(samples: &[u32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum: u64 = samples.iter().map(|&s| s as u64).sum();
        Some(Self {
            sense_mv: (sum / samples.len() as u64) as u32,
        })
    }

    /// Charge estimate, 0..=100.
    pub fn percent(&self) -> u8 {
        let mv = self.sense_mv.clamp(BATTERY_EMPTY_MV, BATTERY_FULL_MV);
        ((mv - BATTERY_EMPTY_MV) * 100 / (BATTERY_FULL_MV - BATTERY_EMPTY_MV)) as u8
    }

    /// Cell voltage in volts.
    pub fn supply_volts(&self) -> f32 {
        (self.sense_mv * BATTERY_DIVIDER) as f32 / 1000.0
    }
}

/// Convert a raw 12-bit SAADC sample (0.6 V reference, gain 1/6) to millivolts.
pub fn saadc_to_mv(raw: i16) -> u32 {
    let raw = raw.max(0) as u32;
    raw * 3600 / 4096
}
