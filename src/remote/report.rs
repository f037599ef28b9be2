//! Status report pushed over the notify characteristic.
//!
//! One line of `LABEL:value` pairs separated by `;`, always in this order:
//!
//! ```text
//! HLAT HLON P1LAT P1LON P1EN P2LAT P2LON P2EN P3LAT P3LON P3EN MODE FUEL RATE VBAT
//! ```
//!
//! The labels and their order are consumed by the companion app; do not
//! reorder.

use core::fmt::Write;

use heapless::String;

use crate::config::BLE_REPORT_MAX;
use crate::settings::PersistedConfig;

pub type ReportLine = String<BLE_REPORT_MAX>;

/// Format the current configuration plus supply voltage.
pub fn status_report(config: &PersistedConfig, supply_volts: f32) -> ReportLine {
    let mut out = ReportLine::new();
    // Every value is range-checked, so the longest line is ~200 bytes and
    // the writes cannot overflow.
    let _ = write_report(&mut out, config, supply_volts);
    out
}

fn write_report(
    out: &mut ReportLine,
    config: &PersistedConfig,
    supply_volts: f32,
) -> core::fmt::Result {
    write!(
        out,
        "HLAT:{:.6};HLON:{:.6}",
        config.home.latitude, config.home.longitude
    )?;
    for (i, poi) in config.pois.iter().enumerate() {
        let n = i + 1;
        write!(
            out,
            ";P{n}LAT:{:.6};P{n}LON:{:.6};P{n}EN:{}",
            poi.location.latitude,
            poi.location.longitude,
            poi.enabled as u8,
        )?;
    }
    write!(
        out,
        ";MODE:{};FUEL:{:.2};RATE:{:.2};VBAT:{:.2}",
        config.mode.code(),
        config.fuel.level_liters,
        config.fuel.burn_rate_lph,
        supply_volts
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuel::FuelModel;
    use crate::nav::GeoPoint;
    use crate::settings::{OperationMode, PointOfInterest};

    #[test]
    fn default_config_report() {
        let report = status_report(&PersistedConfig::default(), 3.7);
        assert_eq!(
            report.as_str(),
            "HLAT:0.000000;HLON:0.000000;\
             P1LAT:0.000000;P1LON:0.000000;P1EN:0;\
             P2LAT:0.000000;P2LON:0.000000;P2EN:0;\
             P3LAT:0.000000;P3LON:0.000000;P3EN:0;\
             MODE:1;FUEL:12.00;RATE:4.50;VBAT:3.70"
        );
    }

    #[test]
    fn widest_values_fit_one_notification() {
        let far = PointOfInterest {
            location: GeoPoint::new(-89.999999, -179.999999).unwrap(),
            enabled: true,
        };
        let config = PersistedConfig {
            home: far.location,
            pois: [far; 3],
            fuel: FuelModel {
                level_liters: 100.0,
                burn_rate_lph: 10.0,
            },
            mode: OperationMode::Walking,
        };
        let report = status_report(&config, 4.2);
        assert!(report.len() < BLE_REPORT_MAX);
        assert!(report.ends_with("MODE:2;FUEL:100.00;RATE:10.00;VBAT:4.20"));
        assert!(report.starts_with("HLAT:-89.999999;HLON:-179.999999;P1LAT:"));
    }
}
