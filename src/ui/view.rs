//! Screen content derived from device state and the latest fix.
//!
//! Everything here is formatting and selection; drawing happens in
//! [`crate::ui::display`]. Values the receiver has not reported render as
//! `N/A`.

use core::fmt::Write;

use heapless::String;

use crate::fix::NavigationFix;
use crate::nav::{self, GeoPoint};
use crate::settings::{OperationMode, PersistedConfig};
use crate::ui::ActiveScreen;

/// Short text field on screen.
pub type Text = String<20>;

pub const NOT_AVAILABLE: &str = "N/A";
pub const WAITING: &str = "Waiting...";

/// Compass screen towards Home or a POI.
#[derive(Clone, Debug, PartialEq)]
pub struct CompassView {
    /// Glyph inside the target marker: `H` or the POI number.
    pub marker: char,
    /// Marker angle relative to the direction of travel, (-180, 180].
    pub relative_bearing: f64,
    /// Fuel remaining, whole litres.
    pub fuel: Text,
    /// Distance to the target in km.
    pub distance: Text,
    /// Ground speed for the speedometer, whole km/h.
    pub speed_kmph: u16,
}

/// Raw fix values.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinatesView {
    pub latitude: Text,
    pub longitude: Text,
    pub altitude: Text,
    pub speed: Text,
    pub satellites: u8,
    pub time: Text,
}

#[derive(Clone, Debug, PartialEq)]
pub enum View {
    Welcome,
    Searching { satellites: u8, time: Text },
    Countdown { seconds: u8, home_lat: Text, home_lon: Text },
    Compass(CompassView),
    Coordinates(CoordinatesView),
    PowerOffNotice,
    Sleep,
}

/// Everything one redraw needs.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub view: View,
    pub battery_percent: u8,
    pub mode: OperationMode,
    /// Screen number label in the corner; empty for notices.
    pub label: Text,
}

pub fn frame(
    screen: ActiveScreen,
    config: &PersistedConfig,
    fix: &NavigationFix,
    battery_percent: u8,
) -> Frame {
    let view = match screen {
        ActiveScreen::Welcome => View::Welcome,
        ActiveScreen::SearchingSatellites => View::Searching {
            satellites: fix.satellites,
            time: fix
                .time
                .map(|t| text(t.to_hms().as_str()))
                .unwrap_or_else(|| text(WAITING)),
        },
        ActiveScreen::Countdown(seconds) => View::Countdown {
            seconds,
            home_lat: fixed(config.home.latitude, 6),
            home_lon: fixed(config.home.longitude, 6),
        },
        ActiveScreen::Home => View::Compass(compass('H', &config.home, config, fix)),
        ActiveScreen::Poi(slot) => {
            let marker = char::from_digit(slot as u32 + 1, 10).unwrap_or('?');
            View::Compass(compass(marker, &config.pois[slot].location, config, fix))
        }
        ActiveScreen::Coordinates => View::Coordinates(coordinates(fix)),
        ActiveScreen::AutoPowerOffNotice => View::PowerOffNotice,
        ActiveScreen::Sleeping => View::Sleep,
    };

    Frame {
        view,
        battery_percent,
        mode: config.mode,
        label: screen_label(screen),
    }
}

fn compass(
    marker: char,
    target: &GeoPoint,
    config: &PersistedConfig,
    fix: &NavigationFix,
) -> CompassView {
    let bearing = fix
        .location
        .map(|here| nav::bearing_to(&here, target))
        .unwrap_or(0.0);
    let heading = fix.course_deg.map(f64::from).unwrap_or(0.0);

    let distance = match fix.location {
        Some(here) => {
            let km = nav::distance_to(&here, target) / 1000.0;
            text(nav::format_distance_km(km).as_str())
        }
        None => text(NOT_AVAILABLE),
    };

    CompassView {
        marker,
        relative_bearing: nav::relative_bearing(bearing, heading),
        fuel: fixed(config.fuel.level_liters, 0),
        distance,
        speed_kmph: fix.speed_kmph.map(|s| s as u16).unwrap_or(0),
    }
}

fn coordinates(fix: &NavigationFix) -> CoordinatesView {
    let na = || text(NOT_AVAILABLE);
    let mut altitude = Text::new();
    let mut speed = Text::new();

    CoordinatesView {
        latitude: fix
            .location
            .map(|p| fixed(p.latitude, 5))
            .unwrap_or_else(na),
        longitude: fix
            .location
            .map(|p| fixed(p.longitude, 5))
            .unwrap_or_else(na),
        altitude: match fix.altitude_m {
            Some(alt) => {
                let _ = write!(altitude, "{:.0}m", alt);
                altitude
            }
            None => na(),
        },
        speed: match fix.speed_kmph {
            Some(kmph) => {
                let _ = write!(speed, "{}km/h", kmph as u32);
                speed
            }
            None => na(),
        },
        satellites: fix.satellites,
        time: fix
            .time
            .map(|t| text(t.to_hms().as_str()))
            .unwrap_or_else(na),
    }
}

/// Corner label identifying the screen.
pub fn screen_label(screen: ActiveScreen) -> Text {
    let mut label = Text::new();
    let _ = match screen {
        ActiveScreen::Welcome => label.push_str("1"),
        ActiveScreen::SearchingSatellites => label.push_str("2"),
        ActiveScreen::Countdown(_) => label.push_str("4"),
        ActiveScreen::Home => label.push_str("5"),
        ActiveScreen::Poi(slot) => write!(label, "P{}", slot + 1).map_err(|_| ()),
        ActiveScreen::Coordinates => label.push_str("6"),
        ActiveScreen::AutoPowerOffNotice | ActiveScreen::Sleeping => Ok(()),
    };
    label
}

fn text(s: &str) -> Text {
    let mut t = Text::new();
    let _ = t.push_str(s);
    t
}

fn fixed(value: f64, decimals: usize) -> Text {
    let mut t = Text::new();
    let _ = write!(t, "{:.*}", decimals, value);
    t
}
