//! Device state machine.
//!
//! [`Controller`] owns all device state. The main loop calls [`Controller::poll`]
//! every tick with the button level and the latest fix, forwards remote
//! commands and link changes, and executes the returned [`Effect`]s.
//! Nothing in here blocks or touches hardware.

use heapless::Vec;

use crate::config::{
    COUNTDOWN_START, COUNTDOWN_STEP_MS, FIX_LOG_INTERVAL_MS, MIN_SATELLITES_FOR_FIX,
    NAV_REDRAW_MS, SEARCH_REDRAW_MS, VIBRATION_CONFIRM_MS, WELCOME_DURATION_MS,
};
use crate::fix::NavigationFix;
use crate::fuel::FuelEstimator;
use crate::power_logic;
use crate::remote;
use crate::settings::{ConfigRegion, PersistedConfig};
use crate::ui::input_logic::{self, ButtonTracker};
use crate::ui::{ActiveScreen, Gesture};

/// State of the BLE configuration link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Advertising,
    Connected,
    Off,
}

/// Side effects requested from the main loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Redraw the current screen.
    Render,
    /// Commit one configuration region to flash.
    Persist(ConfigRegion),
    /// Notify a status report to the connected central.
    PushReport,
    /// Run the sleep sequence.
    EnterSleep,
    /// Pulse the motor for this many ms.
    Vibrate(u64),
    Beep,
}

pub type Effects = Vec<Effect, 8>;

/// Everything the device knows, owned by the main loop.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceState {
    pub home_point_set: bool,
    pub screen: ActiveScreen,
    pub config: PersistedConfig,
    pub link: LinkState,
}

pub struct Controller {
    state: DeviceState,
    buttons: ButtonTracker,
    fuel: FuelEstimator,
    screen_since_ms: u64,
    last_render_ms: u64,
    needs_render: bool,
    last_activity_ms: u64,
    last_fix_log_ms: Option<u64>,
}

impl Controller {
    /// Power-on start at the welcome screen.
    pub fn cold_boot(config: PersistedConfig, now_ms: u64) -> Self {
        Self::starting_at(ActiveScreen::Welcome, config, now_ms)
    }

    /// Start after a button wake: acquisition begins again.
    pub fn resumed(config: PersistedConfig, now_ms: u64) -> Self {
        Self::starting_at(ActiveScreen::SearchingSatellites, config, now_ms)
    }

    fn starting_at(screen: ActiveScreen, config: PersistedConfig, now_ms: u64) -> Self {
        log_info!("starting at {:?}", screen);
        Self {
            state: DeviceState {
                home_point_set: false,
                screen,
                config,
                link: LinkState::Advertising,
            },
            buttons: ButtonTracker::new(),
            fuel: FuelEstimator::new(),
            screen_since_ms: now_ms,
            last_render_ms: now_ms,
            needs_render: true,
            last_activity_ms: now_ms,
            last_fix_log_ms: None,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn screen(&self) -> ActiveScreen {
        self.state.screen
    }

    pub fn config(&self) -> &PersistedConfig {
        &self.state.config
    }

    /// One main-loop tick.
    pub fn poll(
        &mut self,
        now_ms: u64,
        button_down: bool,
        edge_latched: bool,
        fix: &NavigationFix,
    ) -> Effects {
        let mut effects = Effects::new();

        if matches!(
            self.state.screen,
            ActiveScreen::AutoPowerOffNotice | ActiveScreen::Sleeping
        ) {
            return effects;
        }

        let gestures = self.buttons.update(now_ms, button_down, edge_latched);
        if !gestures.is_empty() || self.buttons.is_down() {
            self.last_activity_ms = now_ms;
        }

        let moving = fix.is_moving();
        if moving {
            self.last_activity_ms = now_ms;
        }
        self.fuel.tick(&mut self.state.config.fuel, moving, now_ms);

        if !self.state.home_point_set {
            self.log_fix(now_ms, fix);
        }

        for gesture in gestures {
            self.on_gesture(gesture, now_ms, fix, &mut effects);
            if effects.contains(&Effect::EnterSleep) {
                return effects;
            }
        }

        self.advance_timers(now_ms, fix);

        if self.idle_power_off_due(now_ms) {
            log_info!("idle for too long, powering off");
            self.request_sleep(now_ms, &mut effects);
            return effects;
        }

        if self.render_due(now_ms) {
            self.needs_render = false;
            self.last_render_ms = now_ms;
            let _ = effects.push(Effect::Render);
        }

        effects
    }

    /// A write arrived on the command characteristic.
    pub fn handle_remote(&mut self, raw: &[u8]) -> Effects {
        let mut effects = Effects::new();
        match remote::parse_bytes(raw) {
            Ok(command) => {
                let outcome = remote::apply(&command, &mut self.state.config);
                if let Some(region) = outcome.persist {
                    let _ = effects.push(Effect::Persist(region));
                }
                if outcome.report {
                    let _ = effects.push(Effect::PushReport);
                }
                if outcome.persist.is_some() && self.state.screen.is_navigation() {
                    self.needs_render = true;
                }
            }
            Err(e) => log_warn!("remote command rejected: {:?}", e),
        }
        effects
    }

    /// The BLE task reported a link change.
    pub fn link_changed(&mut self, link: LinkState) -> Effects {
        let mut effects = Effects::new();
        if link != self.state.link {
            log_info!("link {:?} -> {:?}", self.state.link, link);
        }
        self.state.link = link;
        if link == LinkState::Connected {
            let _ = effects.push(Effect::PushReport);
        }
        effects
    }

    fn on_gesture(
        &mut self,
        gesture: Gesture,
        now_ms: u64,
        fix: &NavigationFix,
        effects: &mut Effects,
    ) {
        let screen = self.state.screen;
        match gesture {
            Gesture::Press => {
                if let ActiveScreen::Countdown(_) = screen {
                    self.buttons.swallow_current_press();
                    self.capture_home(now_ms, fix, effects);
                }
            }
            Gesture::ShortPress => {
                if !self.state.home_point_set {
                    log_debug!("short press ignored, no home point");
                    return;
                }
                if let Some(next) = input_logic::short_press_target(screen, &self.state.config.pois) {
                    self.go_to(next, now_ms);
                }
            }
            Gesture::DoubleTap => {
                if let Some(next) = input_logic::double_tap_target(screen) {
                    self.go_to(next, now_ms);
                }
            }
            Gesture::LongPress => {
                if input_logic::long_press_sleeps(screen) {
                    self.request_sleep(now_ms, effects);
                }
            }
        }
    }

    fn capture_home(&mut self, now_ms: u64, fix: &NavigationFix, effects: &mut Effects) {
        let Some(location) = fix.location else {
            log_warn!("no valid location, home point not captured");
            return;
        };
        self.state.config.home = location;
        self.state.home_point_set = true;
        log_info!(
            "home point set to {},{}",
            location.latitude,
            location.longitude
        );
        let _ = effects.push(Effect::Persist(ConfigRegion::Home));
        let _ = effects.push(Effect::Vibrate(VIBRATION_CONFIRM_MS));
        let _ = effects.push(Effect::Beep);
        self.go_to(ActiveScreen::Home, now_ms);
    }

    fn advance_timers(&mut self, now_ms: u64, fix: &NavigationFix) {
        let elapsed = now_ms.saturating_sub(self.screen_since_ms);
        match self.state.screen {
            ActiveScreen::Welcome if elapsed >= WELCOME_DURATION_MS => {
                self.go_to(ActiveScreen::SearchingSatellites, now_ms);
            }
            ActiveScreen::SearchingSatellites if fix.satellites >= MIN_SATELLITES_FOR_FIX => {
                log_info!("{} satellites in view", fix.satellites);
                self.go_to(ActiveScreen::Countdown(COUNTDOWN_START), now_ms);
            }
            ActiveScreen::Countdown(n) if elapsed >= COUNTDOWN_STEP_MS => {
                if n > 1 {
                    self.go_to(ActiveScreen::Countdown(n - 1), now_ms);
                } else {
                    // No press: keep whatever home point was stored.
                    self.state.home_point_set = true;
                    log_info!(
                        "countdown expired, using stored home {},{}",
                        self.state.config.home.latitude,
                        self.state.config.home.longitude
                    );
                    self.go_to(ActiveScreen::Home, now_ms);
                }
            }
            _ => {}
        }
    }

    fn idle_power_off_due(&self, now_ms: u64) -> bool {
        if matches!(self.state.screen, ActiveScreen::Welcome) {
            return false;
        }
        let idle = now_ms.saturating_sub(self.last_activity_ms);
        power_logic::idle_power_off_due(self.state.config.mode, idle)
    }

    fn render_due(&self, now_ms: u64) -> bool {
        if self.needs_render {
            return true;
        }
        let since = now_ms.saturating_sub(self.last_render_ms);
        match self.state.screen {
            ActiveScreen::SearchingSatellites => since >= SEARCH_REDRAW_MS,
            s if s.is_navigation() => since >= NAV_REDRAW_MS,
            _ => false,
        }
    }

    fn request_sleep(&mut self, now_ms: u64, effects: &mut Effects) {
        self.go_to(ActiveScreen::AutoPowerOffNotice, now_ms);
        // The sleep sequence draws its own notices.
        self.needs_render = false;
        let _ = effects.push(Effect::EnterSleep);
    }

    fn go_to(&mut self, screen: ActiveScreen, now_ms: u64) {
        if screen != self.state.screen {
            log_info!("screen {:?} -> {:?}", self.state.screen, screen);
        }
        self.state.screen = screen;
        self.screen_since_ms = now_ms;
        self.needs_render = true;
    }

    fn log_fix(&mut self, now_ms: u64, fix: &NavigationFix) {
        let due = self
            .last_fix_log_ms
            .map(|t| now_ms.saturating_sub(t) >= FIX_LOG_INTERVAL_MS)
            .unwrap_or(true);
        if !due {
            return;
        }
        self.last_fix_log_ms = Some(now_ms);

        match fix.location {
            Some(here) => log_info!(
                "fix {},{} sats={}",
                here.latitude,
                here.longitude,
                fix.satellites
            ),
            None => log_info!("waiting for GPS signal, sats={}", fix.satellites),
        }
        match fix.time {
            Some(t) => log_info!("GPS time {}:{}:{}", t.hours, t.minutes, t.seconds),
            None => log_info!("waiting for GPS time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::GeoPoint;
    use crate::settings::{OperationMode, PointOfInterest};

    fn no_fix() -> NavigationFix {
        NavigationFix::default()
    }

    fn sats(n: u8) -> NavigationFix {
        NavigationFix {
            satellites: n,
            ..Default::default()
        }
    }

    fn located(lat: f64, lon: f64) -> NavigationFix {
        NavigationFix {
            location: GeoPoint::new(lat, lon),
            satellites: 8,
            ..Default::default()
        }
    }

    /// Drive idle ticks every 20 ms, collecting effects.
    fn run(c: &mut Controller, from: u64, to: u64, fix: &NavigationFix) -> std::vec::Vec<Effect> {
        let mut all = std::vec::Vec::new();
        let mut now = from;
        while now < to {
            all.extend(c.poll(now, false, false, fix));
            now += 20;
        }
        all
    }

    fn tap(c: &mut Controller, at: u64, fix: &NavigationFix) -> std::vec::Vec<Effect> {
        let mut all = std::vec::Vec::new();
        all.extend(c.poll(at, true, false, fix));
        all.extend(c.poll(at + 100, false, false, fix));
        all
    }

    /// Controller sitting on Home with a stored home point.
    fn at_home(config: PersistedConfig) -> Controller {
        let mut c = Controller::resumed(config, 0);
        c.state.home_point_set = true;
        c.go_to(ActiveScreen::Home, 0);
        c
    }

    #[test]
    fn welcome_then_search() {
        let mut c = Controller::cold_boot(PersistedConfig::default(), 0);
        assert_eq!(c.poll(0, false, false, &no_fix()).as_slice(), [Effect::Render]);
        run(&mut c, 20, 1_000, &no_fix());
        assert_eq!(c.screen(), ActiveScreen::Welcome);
        assert_eq!(c.poll(1_000, false, false, &no_fix()).as_slice(), [Effect::Render]);
        assert_eq!(c.screen(), ActiveScreen::SearchingSatellites);
    }

    #[test]
    fn search_redraws_every_five_seconds() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        let renders = run(&mut c, 0, 10_001, &sats(1))
            .into_iter()
            .filter(|e| *e == Effect::Render)
            .count();
        // t=0, 5000, 10000
        assert_eq!(renders, 3);
        assert_eq!(c.screen(), ActiveScreen::SearchingSatellites);
    }

    #[test]
    fn enough_satellites_start_countdown() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        c.poll(0, false, false, &sats(3));
        assert_eq!(c.screen(), ActiveScreen::Countdown(10));
    }

    #[test]
    fn countdown_timeout_keeps_stored_home() {
        let stored = GeoPoint::new(64.0, -22.0).unwrap();
        let config = PersistedConfig {
            home: stored,
            ..Default::default()
        };
        let mut c = Controller::resumed(config, 0);
        let fix = located(10.0, 10.0);
        let effects = run(&mut c, 0, 10_000, &fix);
        assert_eq!(c.screen(), ActiveScreen::Countdown(1));
        assert!(!c.state().home_point_set);

        let effects: std::vec::Vec<Effect> = effects
            .into_iter()
            .chain(run(&mut c, 10_000, 11_020, &fix))
            .collect();
        assert_eq!(c.screen(), ActiveScreen::Home);
        assert!(c.state().home_point_set);
        assert_eq!(c.config().home, stored);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Persist(_))));
    }

    #[test]
    fn countdown_press_captures_home() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        let fix = located(63.9, -22.6);
        run(&mut c, 0, 3_000, &fix);
        assert_eq!(c.screen(), ActiveScreen::Countdown(8));

        let effects = c.poll(3_000, true, false, &fix);
        assert!(effects.contains(&Effect::Persist(ConfigRegion::Home)));
        assert!(effects.contains(&Effect::Vibrate(VIBRATION_CONFIRM_MS)));
        assert!(effects.contains(&Effect::Beep));
        assert!(effects.contains(&Effect::Render));
        assert_eq!(c.screen(), ActiveScreen::Home);
        assert!(c.state().home_point_set);
        assert_eq!(c.config().home, GeoPoint::new(63.9, -22.6).unwrap());

        // Releasing the captured press does not cycle screens.
        c.poll(3_100, false, false, &fix);
        run(&mut c, 3_120, 4_000, &fix);
        assert_eq!(c.screen(), ActiveScreen::Home);
    }

    #[test]
    fn countdown_press_without_location_is_ignored() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        c.poll(0, false, false, &sats(5));
        let effects = c.poll(500, true, false, &sats(5));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Persist(_))));
        assert_eq!(c.screen(), ActiveScreen::Countdown(10));
        assert!(!c.state().home_point_set);
    }

    /// Hold the button from `from` to `to`, polling every 20 ms.
    fn hold(c: &mut Controller, from: u64, to: u64, fix: &NavigationFix) -> std::vec::Vec<Effect> {
        let mut all = std::vec::Vec::new();
        let mut now = from;
        while now < to {
            all.extend(c.poll(now, true, false, fix));
            now += 20;
        }
        all
    }

    #[test]
    fn countdown_redraws_once_per_step() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        let fix = sats(5);
        let mut drawn = std::vec::Vec::new();
        let mut now = 0;
        while now < 10_000 {
            if c.poll(now, false, false, &fix).contains(&Effect::Render) {
                drawn.push(c.screen());
            }
            now += 20;
        }
        let expected: std::vec::Vec<ActiveScreen> =
            (1..=COUNTDOWN_START).rev().map(ActiveScreen::Countdown).collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn long_hold_during_countdown_sleeps_without_location() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        let fix = sats(5);
        c.poll(0, false, false, &fix);
        assert_eq!(c.screen(), ActiveScreen::Countdown(10));

        let effects = hold(&mut c, 100, 3_500, &fix);
        assert!(effects.contains(&Effect::EnterSleep));
        assert_eq!(c.screen(), ActiveScreen::AutoPowerOffNotice);
        assert!(!c.state().home_point_set);
    }

    #[test]
    fn long_hold_during_countdown_captures_home_then_sleeps() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        let fix = located(45.0, 7.0);
        c.poll(0, false, false, &fix);
        assert_eq!(c.screen(), ActiveScreen::Countdown(10));

        let effects = hold(&mut c, 100, 3_500, &fix);
        assert!(effects.contains(&Effect::Persist(ConfigRegion::Home)));
        assert!(effects.contains(&Effect::EnterSleep));
        assert_eq!(c.screen(), ActiveScreen::AutoPowerOffNotice);
        assert_eq!(c.config().home, GeoPoint::new(45.0, 7.0).unwrap());
    }

    #[test]
    fn short_press_cycles_and_skips_disabled() {
        let mut config = PersistedConfig::default();
        config.pois[0].enabled = true;
        let mut c = at_home(config);
        let fix = no_fix();

        tap(&mut c, 1_000, &fix);
        run(&mut c, 1_120, 1_800, &fix);
        assert_eq!(c.screen(), ActiveScreen::Poi(0));

        tap(&mut c, 2_000, &fix);
        run(&mut c, 2_120, 2_800, &fix);
        assert_eq!(c.screen(), ActiveScreen::Home);
    }

    #[test]
    fn double_tap_shows_coordinates_and_short_press_returns() {
        let mut config = PersistedConfig::default();
        config.pois = [PointOfInterest {
            location: GeoPoint::new(1.0, 1.0).unwrap(),
            enabled: true,
        }; 3];
        let mut c = at_home(config);
        let fix = no_fix();

        tap(&mut c, 1_000, &fix);
        run(&mut c, 1_120, 1_300, &fix);
        tap(&mut c, 1_300, &fix);
        assert_eq!(c.screen(), ActiveScreen::Coordinates);

        run(&mut c, 1_420, 2_000, &fix);
        tap(&mut c, 2_000, &fix);
        run(&mut c, 2_120, 2_800, &fix);
        assert_eq!(c.screen(), ActiveScreen::Home);
    }

    #[test]
    fn short_press_ignored_while_searching() {
        let mut c = Controller::resumed(PersistedConfig::default(), 0);
        tap(&mut c, 0, &sats(0));
        run(&mut c, 120, 1_000, &sats(0));
        assert_eq!(c.screen(), ActiveScreen::SearchingSatellites);
    }

    #[test]
    fn long_press_requests_sleep() {
        let mut c = at_home(PersistedConfig::default());
        let fix = no_fix();
        let mut effects = std::vec::Vec::new();
        let mut now = 100;
        while now <= 3_200 {
            effects.extend(c.poll(now, true, false, &fix));
            now += 20;
        }
        assert!(effects.contains(&Effect::EnterSleep));
        assert_eq!(c.screen(), ActiveScreen::AutoPowerOffNotice);

        // Nothing else happens once the sleep sequence has been requested.
        assert!(c.poll(3_300, false, false, &fix).is_empty());
    }

    #[test]
    fn navigation_redraws_every_two_seconds() {
        let mut c = at_home(PersistedConfig::default());
        let renders = run(&mut c, 0, 6_001, &no_fix())
            .into_iter()
            .filter(|e| *e == Effect::Render)
            .count();
        // t=0 (pending transition), 2000, 4000, 6000
        assert_eq!(renders, 4);
    }

    #[test]
    fn idle_timeout_powers_off_walking() {
        let config = PersistedConfig {
            mode: OperationMode::Walking,
            ..Default::default()
        };
        let mut c = at_home(config);
        c.poll(0, false, false, &no_fix());
        let effects = c.poll(15 * 60 * 1000 - 20, false, false, &no_fix());
        assert!(!effects.contains(&Effect::EnterSleep));
        assert_eq!(c.screen(), ActiveScreen::Home);
        let effects = c.poll(15 * 60 * 1000, false, false, &no_fix());
        assert!(effects.contains(&Effect::EnterSleep));
    }

    #[test]
    fn motion_keeps_device_awake() {
        let mut c = at_home(PersistedConfig::default());
        let moving = NavigationFix {
            speed_kmph: Some(90.0),
            ..Default::default()
        };
        let effects = c.poll(45 * 60 * 1000, false, false, &moving);
        assert!(!effects.contains(&Effect::EnterSleep));
        assert_eq!(c.screen(), ActiveScreen::Home);
    }

    #[test]
    fn fuel_burns_while_moving() {
        let mut c = at_home(PersistedConfig::default());
        let moving = NavigationFix {
            speed_kmph: Some(100.0),
            ..Default::default()
        };
        run(&mut c, 0, 5_000, &moving);
        assert!(c.config().fuel.level_liters < 12.0);
    }

    #[test]
    fn remote_commands_produce_effects() {
        let mut c = at_home(PersistedConfig::default());
        assert_eq!(
            c.handle_remote(b"MODE:2").as_slice(),
            [Effect::Persist(ConfigRegion::Mode), Effect::PushReport]
        );
        assert_eq!(c.handle_remote(b"GET_DATA").as_slice(), [Effect::PushReport]);
        assert!(c.handle_remote(b"bogus").is_empty());
        assert!(c.handle_remote(b"FUEL:12:4.5").is_empty());
    }

    #[test]
    fn connect_pushes_report() {
        let mut c = Controller::cold_boot(PersistedConfig::default(), 0);
        assert_eq!(c.link_changed(LinkState::Connected).as_slice(), [Effect::PushReport]);
        assert!(c.link_changed(LinkState::Advertising).is_empty());
        assert_eq!(c.state().link, LinkState::Advertising);
    }
}
