//! Button gesture classification and screen cycling.
//!
//! The main loop samples the button every tick and hands the level (plus
//! the edge flag latched by the GPIO task) to [`ButtonTracker::update`].
//! All timing is derived from the monotonic `now_ms` passed in.

use heapless::Vec;

use crate::config::{BUTTON_DEBOUNCE_MS, DOUBLE_TAP_WINDOW_MS, LONG_PRESS_MS, SHORT_PRESS_MAX_MS};
use crate::settings::{PointOfInterest, POI_COUNT};
use crate::ui::{ActiveScreen, Gesture};

/// Gestures produced by one update. At most a pending short press, a
/// down edge and a long press can coincide.
pub type Gestures = Vec<Gesture, 4>;

pub struct ButtonTracker {
    down: bool,
    last_change_ms: Option<u64>,
    pressed_at_ms: Option<u64>,
    long_fired: bool,
    swallowed: bool,
    /// Release time of a short press that may still become a double-tap.
    pending_short_ms: Option<u64>,
}

impl ButtonTracker {
    pub const fn new() -> Self {
        Self {
            down: false,
            last_change_ms: None,
            pressed_at_ms: None,
            long_fired: false,
            swallowed: false,
            pending_short_ms: None,
        }
    }

    /// Feed one sample.
    ///
    /// `edge_latched` is the falling edge seen by the interrupt since the
    /// last sample, so a tap shorter than the loop period still counts.
    pub fn update(&mut self, now_ms: u64, level_down: bool, edge_latched: bool) -> Gestures {
        let mut out = Gestures::new();
        let raw = level_down || edge_latched;

        let settled = self
            .last_change_ms
            .map(|t| now_ms.saturating_sub(t) >= BUTTON_DEBOUNCE_MS)
            .unwrap_or(true);

        if raw != self.down && settled {
            self.down = raw;
            self.last_change_ms = Some(now_ms);
            if raw {
                self.pressed_at_ms = Some(now_ms);
                self.long_fired = false;
                let _ = out.push(Gesture::Press);
            } else {
                self.on_release(now_ms, &mut out);
            }
        }

        if self.down && !self.long_fired {
            if let Some(at) = self.pressed_at_ms {
                if now_ms.saturating_sub(at) >= LONG_PRESS_MS {
                    self.long_fired = true;
                    self.pending_short_ms = None;
                    let _ = out.push(Gesture::LongPress);
                }
            }
        }

        if let Some(released) = self.pending_short_ms {
            if now_ms.saturating_sub(released) > DOUBLE_TAP_WINDOW_MS {
                self.pending_short_ms = None;
                let _ = out.push(Gesture::ShortPress);
            }
        }

        out
    }

    fn on_release(&mut self, now_ms: u64, out: &mut Gestures) {
        let Some(pressed_at) = self.pressed_at_ms.take() else {
            return;
        };
        let consumed = self.swallowed || self.long_fired;
        self.swallowed = false;
        self.long_fired = false;
        if consumed {
            return;
        }

        let held = now_ms.saturating_sub(pressed_at);
        if held >= SHORT_PRESS_MAX_MS {
            log_debug!("button held {} ms, ignored", held);
            return;
        }

        match self.pending_short_ms.take() {
            Some(first) if now_ms.saturating_sub(first) <= DOUBLE_TAP_WINDOW_MS => {
                let _ = out.push(Gesture::DoubleTap);
            }
            _ => self.pending_short_ms = Some(now_ms),
        }
    }

    /// The current press was consumed elsewhere: its release yields no
    /// short press or double-tap and a pending short press is cancelled.
    /// Holding it long enough still reports [`Gesture::LongPress`].
    pub fn swallow_current_press(&mut self) {
        if self.down {
            self.swallowed = true;
        }
        self.pending_short_ms = None;
    }

    /// Debounced level.
    pub fn is_down(&self) -> bool {
        self.down
    }

    /// Forget everything, e.g. after waking.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ButtonTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// First enabled POI slot at or after `start`.
pub fn next_enabled_poi(pois: &[PointOfInterest; POI_COUNT], start: usize) -> Option<usize> {
    (start..POI_COUNT).find(|&slot| pois[slot].enabled)
}

/// Screen after a short press, or `None` if short presses are ignored here.
pub fn short_press_target(
    screen: ActiveScreen,
    pois: &[PointOfInterest; POI_COUNT],
) -> Option<ActiveScreen> {
    match screen {
        ActiveScreen::Home => Some(
            next_enabled_poi(pois, 0)
                .map(ActiveScreen::Poi)
                .unwrap_or(ActiveScreen::Home),
        ),
        ActiveScreen::Poi(slot) => Some(
            next_enabled_poi(pois, slot + 1)
                .map(ActiveScreen::Poi)
                .unwrap_or(ActiveScreen::Home),
        ),
        ActiveScreen::Coordinates => Some(ActiveScreen::Home),
        ActiveScreen::Welcome
        | ActiveScreen::SearchingSatellites
        | ActiveScreen::Countdown(_)
        | ActiveScreen::AutoPowerOffNotice
        | ActiveScreen::Sleeping => None,
    }
}

/// Screen after a double-tap, or `None` if ignored here.
pub fn double_tap_target(screen: ActiveScreen) -> Option<ActiveScreen> {
    screen.is_navigation().then_some(ActiveScreen::Coordinates)
}

/// Whether a long press starts the sleep sequence on this screen.
pub fn long_press_sleeps(screen: ActiveScreen) -> bool {
    !matches!(
        screen,
        ActiveScreen::Welcome | ActiveScreen::AutoPowerOffNotice | ActiveScreen::Sleeping
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::GeoPoint;

    fn pois(enabled: [bool; 3]) -> [PointOfInterest; 3] {
        enabled.map(|enabled| PointOfInterest {
            location: GeoPoint::default(),
            enabled,
        })
    }

    /// Sample every 20 ms from `from` to `to` (exclusive) at a fixed level.
    fn hold(t: &mut ButtonTracker, from: u64, to: u64, down: bool) -> std::vec::Vec<Gesture> {
        let mut seen = std::vec::Vec::new();
        let mut now = from;
        while now < to {
            seen.extend(t.update(now, down, false));
            now += 20;
        }
        seen
    }

    #[test]
    fn lone_short_press_reported_after_window() {
        let mut t = ButtonTracker::new();
        assert_eq!(hold(&mut t, 0, 200, true), [Gesture::Press]);
        assert!(hold(&mut t, 200, 700, false).is_empty());
        assert_eq!(hold(&mut t, 700, 760, false), [Gesture::ShortPress]);
    }

    #[test]
    fn two_quick_taps_are_a_double_tap() {
        let mut t = ButtonTracker::new();
        let mut seen = hold(&mut t, 0, 100, true);
        seen.extend(hold(&mut t, 100, 300, false));
        seen.extend(hold(&mut t, 300, 400, true));
        seen.extend(hold(&mut t, 400, 1_500, false));
        assert_eq!(seen, [Gesture::Press, Gesture::Press, Gesture::DoubleTap]);
    }

    #[test]
    fn slow_taps_are_two_short_presses() {
        let mut t = ButtonTracker::new();
        let mut seen = hold(&mut t, 0, 100, true);
        seen.extend(hold(&mut t, 100, 800, false));
        seen.extend(hold(&mut t, 800, 900, true));
        seen.extend(hold(&mut t, 900, 2_000, false));
        assert_eq!(
            seen,
            [
                Gesture::Press,
                Gesture::ShortPress,
                Gesture::Press,
                Gesture::ShortPress
            ]
        );
    }

    #[test]
    fn long_press_fires_once_while_held() {
        let mut t = ButtonTracker::new();
        let seen = hold(&mut t, 0, 3_000, true);
        assert_eq!(seen, [Gesture::Press]);
        assert_eq!(t.update(3_000, true, false).as_slice(), [Gesture::LongPress]);
        assert!(hold(&mut t, 3_020, 6_000, true).is_empty());
        assert!(hold(&mut t, 6_000, 7_000, false).is_empty());
    }

    #[test]
    fn medium_hold_is_nothing() {
        let mut t = ButtonTracker::new();
        let mut seen = hold(&mut t, 0, 1_500, true);
        seen.extend(hold(&mut t, 1_500, 3_000, false));
        assert_eq!(seen, [Gesture::Press]);
    }

    #[test]
    fn bounce_inside_debounce_is_ignored() {
        let mut t = ButtonTracker::new();
        assert_eq!(t.update(0, true, false).as_slice(), [Gesture::Press]);
        assert!(t.update(10, false, false).is_empty());
        assert!(t.update(30, true, false).is_empty());
        assert!(t.is_down());
    }

    #[test]
    fn latched_edge_counts_as_press() {
        let mut t = ButtonTracker::new();
        assert_eq!(t.update(0, false, true).as_slice(), [Gesture::Press]);
        assert!(t.update(60, false, false).is_empty());
        assert_eq!(t.update(600, false, false).as_slice(), [Gesture::ShortPress]);
    }

    #[test]
    fn swallowed_press_gives_no_short_press() {
        let mut t = ButtonTracker::new();
        assert_eq!(t.update(0, true, false).as_slice(), [Gesture::Press]);
        t.swallow_current_press();
        assert!(hold(&mut t, 20, 200, true).is_empty());
        assert!(hold(&mut t, 200, 1_500, false).is_empty());
    }

    #[test]
    fn swallowed_press_can_still_be_held_long() {
        let mut t = ButtonTracker::new();
        assert_eq!(t.update(0, true, false).as_slice(), [Gesture::Press]);
        t.swallow_current_press();
        assert_eq!(hold(&mut t, 20, 4_000, true), [Gesture::LongPress]);
        assert!(hold(&mut t, 4_000, 5_000, false).is_empty());
    }

    #[test]
    fn home_cycles_through_enabled_pois() {
        let p = pois([true, false, true]);
        assert_eq!(short_press_target(ActiveScreen::Home, &p), Some(ActiveScreen::Poi(0)));
        assert_eq!(short_press_target(ActiveScreen::Poi(0), &p), Some(ActiveScreen::Poi(2)));
        assert_eq!(short_press_target(ActiveScreen::Poi(2), &p), Some(ActiveScreen::Home));
    }

    #[test]
    fn home_stays_home_without_pois() {
        let p = pois([false; 3]);
        assert_eq!(short_press_target(ActiveScreen::Home, &p), Some(ActiveScreen::Home));
    }

    #[test]
    fn only_first_poi_enabled_returns_home() {
        let p = pois([true, false, false]);
        assert_eq!(short_press_target(ActiveScreen::Home, &p), Some(ActiveScreen::Poi(0)));
        assert_eq!(short_press_target(ActiveScreen::Poi(0), &p), Some(ActiveScreen::Home));
    }

    #[test]
    fn coordinates_and_ignored_screens() {
        let p = pois([true; 3]);
        assert_eq!(short_press_target(ActiveScreen::Coordinates, &p), Some(ActiveScreen::Home));
        assert_eq!(short_press_target(ActiveScreen::SearchingSatellites, &p), None);
        assert_eq!(short_press_target(ActiveScreen::Countdown(4), &p), None);
        assert_eq!(short_press_target(ActiveScreen::Welcome, &p), None);
    }

    #[test]
    fn double_tap_and_long_press_availability() {
        assert_eq!(double_tap_target(ActiveScreen::Poi(1)), Some(ActiveScreen::Coordinates));
        assert_eq!(double_tap_target(ActiveScreen::Countdown(3)), None);
        assert!(long_press_sleeps(ActiveScreen::SearchingSatellites));
        assert!(long_press_sleeps(ActiveScreen::Countdown(5)));
        assert!(!long_press_sleeps(ActiveScreen::Welcome));
        assert!(!long_press_sleeps(ActiveScreen::Sleeping));
    }
}
