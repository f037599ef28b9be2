//! Remote text commands received over the BLE write characteristic.
//!
//! Grammar (trimmed, first match wins):
//!
//! ```text
//! POI:<1-3>:<lat>:<lon>:<0|1>
//! GET_DATA
//! FUEL:<level>:<rate>
//! MODE:<1|2>
//! <lat>:<lon>:<0|1>            legacy single POI, sets slot 1
//! ```
//!
//! [`parse`] only checks syntax and value domains; [`apply`] mutates the
//! configuration and reports what must be persisted and whether a status
//! report should be pushed.

pub mod report;

pub use report::status_report;

use core::str::Split;

use crate::fuel::FuelModel;
use crate::nav::GeoPoint;
use crate::settings::{ConfigRegion, OperationMode, PersistedConfig, PointOfInterest, POI_COUNT};

/// A syntactically valid remote command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Set one POI slot (0-based).
    SetPoi { slot: usize, poi: PointOfInterest },
    /// Legacy form; always targets slot 0.
    SetLegacyPoi(PointOfInterest),
    /// Push a status report.
    GetData,
    /// Fields are range-checked individually when applied.
    SetFuel { level: f64, rate: f64 },
    SetMode(OperationMode),
}

/// Why a command was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    Empty,
    /// Not valid UTF-8.
    Encoding,
    /// No form matched.
    Unknown,
    /// Wrong number of `:`-separated fields for the matched form.
    FieldCount,
    /// POI index outside 1..=3.
    BadIndex,
    /// A numeric field did not parse.
    BadNumber,
    /// Latitude or longitude outside the valid ranges.
    OutOfRange,
    /// Enabled flag other than `0` or `1`.
    BadFlag,
    /// Mode other than `1` or `2`.
    BadMode,
}

/// What the caller has to do after a command was applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub persist: Option<ConfigRegion>,
    pub report: bool,
}

/// Parse a raw write from the link.
pub fn parse_bytes(raw: &[u8]) -> Result<Command, CommandError> {
    let text = core::str::from_utf8(raw).map_err(|_| CommandError::Encoding)?;
    parse(text)
}

pub fn parse(text: &str) -> Result<Command, CommandError> {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if text.is_empty() {
        return Err(CommandError::Empty);
    }

    if let Some(rest) = text.strip_prefix("POI:") {
        let mut fields = rest.split(':');
        let index: usize = next_field(&mut fields)?
            .parse()
            .map_err(|_| CommandError::BadIndex)?;
        if !(1..=POI_COUNT).contains(&index) {
            return Err(CommandError::BadIndex);
        }
        let poi = parse_poi(&mut fields)?;
        finish(&mut fields)?;
        return Ok(Command::SetPoi {
            slot: index - 1,
            poi,
        });
    }

    if text == "GET_DATA" {
        return Ok(Command::GetData);
    }

    if let Some(rest) = text.strip_prefix("FUEL:") {
        let mut fields = rest.split(':');
        let level = parse_number(next_field(&mut fields)?)?;
        let rate = parse_number(next_field(&mut fields)?)?;
        finish(&mut fields)?;
        return Ok(Command::SetFuel { level, rate });
    }

    if let Some(rest) = text.strip_prefix("MODE:") {
        let code: i32 = rest.trim().parse().map_err(|_| CommandError::BadMode)?;
        return OperationMode::from_code(code)
            .map(Command::SetMode)
            .ok_or(CommandError::BadMode);
    }

    // Legacy form only matches three purely numeric fields.
    let mut fields = text.split(':');
    if text.split(':').count() != 3 {
        return Err(CommandError::Unknown);
    }
    let poi = parse_poi(&mut fields).map_err(|e| match e {
        CommandError::BadNumber => CommandError::Unknown,
        other => other,
    })?;
    Ok(Command::SetLegacyPoi(poi))
}

/// Apply a parsed command to the configuration.
pub fn apply(command: &Command, config: &mut PersistedConfig) -> Outcome {
    match *command {
        Command::SetPoi { slot, poi } => {
            config.pois[slot] = poi;
            log_info!(
                "POI {} set to {},{} enabled={}",
                slot + 1,
                poi.location.latitude,
                poi.location.longitude,
                poi.enabled
            );
            Outcome {
                persist: Some(ConfigRegion::Pois),
                report: true,
            }
        }
        Command::SetLegacyPoi(poi) => {
            config.pois[0] = poi;
            log_info!(
                "POI 1 set (legacy) to {},{} enabled={}",
                poi.location.latitude,
                poi.location.longitude,
                poi.enabled
            );
            Outcome {
                persist: Some(ConfigRegion::Pois),
                report: true,
            }
        }
        Command::GetData => Outcome {
            persist: None,
            report: true,
        },
        Command::SetFuel { level, rate } => {
            let mut changed = false;

            if !FuelModel::level_in_range(level) {
                log_warn!("fuel level {} out of range, kept {}", level, config.fuel.level_liters);
            } else if level != config.fuel.level_liters {
                config.fuel.level_liters = level;
                changed = true;
            }

            if !FuelModel::rate_in_range(rate) {
                log_warn!("burn rate {} out of range, kept {}", rate, config.fuel.burn_rate_lph);
            } else if rate != config.fuel.burn_rate_lph {
                config.fuel.burn_rate_lph = rate;
                changed = true;
            }

            if changed {
                log_info!(
                    "fuel set to {} L at {} L/h",
                    config.fuel.level_liters,
                    config.fuel.burn_rate_lph
                );
                Outcome {
                    persist: Some(ConfigRegion::Fuel),
                    report: true,
                }
            } else {
                log_debug!("fuel command changed nothing");
                Outcome::default()
            }
        }
        Command::SetMode(mode) => {
            config.mode = mode;
            log_info!("operation mode set to {:?}", mode);
            Outcome {
                persist: Some(ConfigRegion::Mode),
                report: true,
            }
        }
    }
}

fn next_field<'a>(fields: &mut Split<'a, char>) -> Result<&'a str, CommandError> {
    fields.next().ok_or(CommandError::FieldCount)
}

fn finish(fields: &mut Split<'_, char>) -> Result<(), CommandError> {
    match fields.next() {
        None => Ok(()),
        Some(_) => Err(CommandError::FieldCount),
    }
}

fn parse_number(field: &str) -> Result<f64, CommandError> {
    field.trim().parse().map_err(|_| CommandError::BadNumber)
}

fn parse_poi(fields: &mut Split<'_, char>) -> Result<PointOfInterest, CommandError> {
    let latitude = parse_number(next_field(fields)?)?;
    let longitude = parse_number(next_field(fields)?)?;
    let enabled = match next_field(fields)?.trim() {
        "0" => false,
        "1" => true,
        _ => return Err(CommandError::BadFlag),
    };
    let location = GeoPoint::new(latitude, longitude).ok_or(CommandError::OutOfRange)?;
    Ok(PointOfInterest { location, enabled })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, config: &mut PersistedConfig) -> Result<Outcome, CommandError> {
        parse(text).map(|cmd| apply(&cmd, config))
    }

    #[test]
    fn poi_command_targets_one_slot() {
        let mut config = PersistedConfig::default();
        let before = config;
        let outcome = run("POI:2:10.0:20.0:1", &mut config).unwrap();

        assert_eq!(outcome.persist, Some(ConfigRegion::Pois));
        assert!(outcome.report);
        assert_eq!(config.pois[1].location, GeoPoint::new(10.0, 20.0).unwrap());
        assert!(config.pois[1].enabled);
        assert_eq!(config.pois[0], before.pois[0]);
        assert_eq!(config.pois[2], before.pois[2]);
    }

    #[test]
    fn poi_index_out_of_range_is_rejected() {
        assert_eq!(parse("POI:0:10:20:1"), Err(CommandError::BadIndex));
        assert_eq!(parse("POI:4:10:20:1"), Err(CommandError::BadIndex));
        assert_eq!(parse("POI:x:10:20:1"), Err(CommandError::BadIndex));
    }

    #[test]
    fn poi_field_validation() {
        assert_eq!(parse("POI:1:95:20:1"), Err(CommandError::OutOfRange));
        assert_eq!(parse("POI:1:10:20:2"), Err(CommandError::BadFlag));
        assert_eq!(parse("POI:1:10:20"), Err(CommandError::FieldCount));
        assert_eq!(parse("POI:1:10:20:1:9"), Err(CommandError::FieldCount));
        assert_eq!(parse("POI:1:ten:20:1"), Err(CommandError::BadNumber));
    }

    #[test]
    fn legacy_form_sets_first_slot() {
        let mut config = PersistedConfig::default();
        let outcome = run(" 63.5:-19.25:1\r\n", &mut config).unwrap();
        assert_eq!(outcome.persist, Some(ConfigRegion::Pois));
        assert_eq!(config.pois[0].location, GeoPoint::new(63.5, -19.25).unwrap());
        assert!(config.pois[0].enabled);
    }

    #[test]
    fn get_data_only_reports() {
        let mut config = PersistedConfig::default();
        let before = config;
        let outcome = run("GET_DATA", &mut config).unwrap();
        assert_eq!(
            outcome,
            Outcome {
                persist: None,
                report: true
            }
        );
        assert_eq!(config, before);
    }

    #[test]
    fn fuel_unparseable_is_rejected_without_change() {
        let mut config = PersistedConfig::default();
        run("FUEL:50:3", &mut config).unwrap();
        assert_eq!(run("FUEL:abc", &mut config), Err(CommandError::BadNumber));
        assert_eq!(run("FUEL:40:abc", &mut config), Err(CommandError::BadNumber));
        assert_eq!(config.fuel.level_liters, 50.0);
        assert_eq!(config.fuel.burn_rate_lph, 3.0);
    }

    #[test]
    fn fuel_fields_validate_independently() {
        let mut config = PersistedConfig::default();
        let outcome = run("FUEL:150:3", &mut config).unwrap();
        assert_eq!(config.fuel.level_liters, 12.0);
        assert_eq!(config.fuel.burn_rate_lph, 3.0);
        assert_eq!(outcome.persist, Some(ConfigRegion::Fuel));
        assert!(outcome.report);

        let outcome = run("FUEL:20:0", &mut config).unwrap();
        assert_eq!(config.fuel.level_liters, 20.0);
        assert_eq!(config.fuel.burn_rate_lph, 3.0);
        assert!(outcome.report);
    }

    #[test]
    fn fuel_without_change_is_silent() {
        let mut config = PersistedConfig::default();
        let outcome = run("FUEL:12:4.5", &mut config).unwrap();
        assert_eq!(outcome, Outcome::default());

        let outcome = run("FUEL:0:11", &mut config).unwrap();
        assert_eq!(outcome, Outcome::default());
    }

    #[test]
    fn mode_command() {
        let mut config = PersistedConfig::default();
        let outcome = run("MODE:2", &mut config).unwrap();
        assert_eq!(config.mode, OperationMode::Walking);
        assert_eq!(outcome.persist, Some(ConfigRegion::Mode));
        assert!(outcome.report);

        // Re-selecting the current mode still persists and reports.
        let outcome = run("MODE:2", &mut config).unwrap();
        assert!(outcome.report);

        assert_eq!(parse("MODE:3"), Err(CommandError::BadMode));
        assert_eq!(parse("MODE:"), Err(CommandError::BadMode));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert_eq!(parse(""), Err(CommandError::Empty));
        assert_eq!(parse("  \0"), Err(CommandError::Empty));
        assert_eq!(parse("HELLO"), Err(CommandError::Unknown));
        assert_eq!(parse("a:b:c"), Err(CommandError::Unknown));
        assert_eq!(parse("1:2"), Err(CommandError::Unknown));
        assert_eq!(parse_bytes(&[0xFF, 0xFE]), Err(CommandError::Encoding));
    }
}
