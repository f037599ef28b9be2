//! Latest-valid GPS fix snapshot.
//!
//! The GPS task turns parsed sentences into [`FixUpdate`]s; the main loop
//! merges them into a [`FixTracker`] and reads the [`NavigationFix`]
//! snapshot. Each field carries its own validity: once a field has been
//! valid it keeps its last value until a newer one arrives.

use core::fmt::Write;

use heapless::String;

use crate::config::MOTION_THRESHOLD_KMPH;
use crate::nav::GeoPoint;

/// UTC time of day reported by the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TimeOfDay {
    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Option<Self> {
        (hours < 24 && minutes < 60 && seconds < 60).then_some(Self {
            hours,
            minutes,
            seconds,
        })
    }

    /// `HH:MM:SS`
    pub fn to_hms(&self) -> String<8> {
        let mut s = String::new();
        let _ = write!(s, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds);
        s
    }
}

/// Snapshot of everything the receiver has told us so far.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NavigationFix {
    pub location: Option<GeoPoint>,
    pub altitude_m: Option<f32>,
    pub speed_kmph: Option<f32>,
    pub course_deg: Option<f32>,
    pub satellites: u8,
    pub time: Option<TimeOfDay>,
}

impl NavigationFix {
    /// Valid speed above the motion threshold.
    pub fn is_moving(&self) -> bool {
        self.speed_kmph
            .map(|kmph| kmph > MOTION_THRESHOLD_KMPH)
            .unwrap_or(false)
    }
}

/// Fields decoded from one sentence. `None` means "not reported".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FixUpdate {
    pub location: Option<GeoPoint>,
    pub altitude_m: Option<f32>,
    pub speed_kmph: Option<f32>,
    pub course_deg: Option<f32>,
    pub satellites: Option<u8>,
    pub time: Option<TimeOfDay>,
}

#[derive(Default)]
pub struct FixTracker {
    fix: NavigationFix,
    sentences: u32,
}

impl FixTracker {
    pub const fn new() -> Self {
        Self {
            fix: NavigationFix {
                location: None,
                altitude_m: None,
                speed_kmph: None,
                course_deg: None,
                satellites: 0,
                time: None,
            },
            sentences: 0,
        }
    }

    /// Merge one decoded sentence into the snapshot.
    pub fn apply(&mut self, update: FixUpdate) {
        self.sentences = self.sentences.wrapping_add(1);

        if update.location.is_some() {
            self.fix.location = update.location;
        }
        if let Some(alt) = update.altitude_m.filter(|a| a.is_finite()) {
            self.fix.altitude_m = Some(alt);
        }
        if let Some(speed) = update.speed_kmph.filter(|s| s.is_finite() && *s >= 0.0) {
            self.fix.speed_kmph = Some(speed);
        }
        if let Some(course) = update
            .course_deg
            .filter(|c| c.is_finite() && (0.0..360.0).contains(c))
        {
            self.fix.course_deg = Some(course);
        }
        if let Some(sats) = update.satellites {
            self.fix.satellites = sats;
        }
        if update.time.is_some() {
            self.fix.time = update.time;
        }
    }

    pub fn snapshot(&self) -> &NavigationFix {
        &self.fix
    }

    /// Number of sentences merged since boot.
    pub fn sentences(&self) -> u32 {
        self.sentences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_nothing_valid() {
        let tracker = FixTracker::new();
        let fix = tracker.snapshot();
        assert!(fix.location.is_none());
        assert!(fix.speed_kmph.is_none());
        assert!(fix.time.is_none());
        assert_eq!(fix.satellites, 0);
        assert!(!fix.is_moving());
    }

    #[test]
    fn partial_update_keeps_previous_fields() {
        let mut tracker = FixTracker::new();
        tracker.apply(FixUpdate {
            location: GeoPoint::new(64.1, -21.9),
            altitude_m: Some(42.0),
            satellites: Some(7),
            ..Default::default()
        });
        tracker.apply(FixUpdate {
            speed_kmph: Some(30.0),
            course_deg: Some(270.0),
            ..Default::default()
        });

        let fix = tracker.snapshot();
        assert_eq!(fix.location, GeoPoint::new(64.1, -21.9));
        assert_eq!(fix.altitude_m, Some(42.0));
        assert_eq!(fix.speed_kmph, Some(30.0));
        assert_eq!(fix.satellites, 7);
        assert!(fix.is_moving());
        assert_eq!(tracker.sentences(), 2);
    }

    #[test]
    fn satellite_count_can_drop() {
        let mut tracker = FixTracker::new();
        tracker.apply(FixUpdate {
            satellites: Some(5),
            ..Default::default()
        });
        tracker.apply(FixUpdate {
            satellites: Some(0),
            ..Default::default()
        });
        assert_eq!(tracker.snapshot().satellites, 0);
    }

    #[test]
    fn garbage_values_are_ignored() {
        let mut tracker = FixTracker::new();
        tracker.apply(FixUpdate {
            speed_kmph: Some(-3.0),
            course_deg: Some(400.0),
            altitude_m: Some(f32::NAN),
            ..Default::default()
        });
        let fix = tracker.snapshot();
        assert!(fix.speed_kmph.is_none());
        assert!(fix.course_deg.is_none());
        assert!(fix.altitude_m.is_none());
    }

    #[test]
    fn slow_speed_is_not_motion() {
        let mut tracker = FixTracker::new();
        tracker.apply(FixUpdate {
            speed_kmph: Some(8.0),
            ..Default::default()
        });
        assert!(!tracker.snapshot().is_moving());
    }

    #[test]
    fn time_of_day_validation_and_format() {
        assert!(TimeOfDay::new(24, 0, 0).is_none());
        assert!(TimeOfDay::new(23, 60, 0).is_none());
        assert_eq!(TimeOfDay::new(7, 5, 9).unwrap().to_hms().as_str(), "07:05:09");
    }
}
