//! Sleep and wake sequencing policy.
//!
//! The order of [`SLEEP_SEQUENCE`] matters: the radio and every peripheral
//! must be quiet before System OFF is requested, and the wake source is
//! armed last so a bouncing button cannot wake a half-configured chip.
//! Hardware access goes through [`SleepHardware`] so the policy can be
//! checked on the host.

use crate::config::{IDLE_POWER_OFF_FLYING_MS, IDLE_POWER_OFF_WALKING_MS};
use crate::settings::OperationMode;

/// One step of the sleep sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepStep {
    ShowPowerOffNotice,
    ShowSleepNotice,
    /// Leave the sleep notice up long enough to be read.
    HoldNotice,
    DisableButtonInterrupt,
    CloseGpsChannel,
    GpsPowerDown,
    BacklightOff,
    PeripheralRailOff,
    MotorOff,
    RadiosOff,
    /// Button pin back to a plain pulled-up input.
    WakePinPullUp,
    DisableWakeSources,
    /// Level-low sense on the button pin.
    EnableButtonWake,
    Settle,
    /// Does not return on hardware.
    SystemOff,
}

pub const SLEEP_SEQUENCE: [SleepStep; 15] = [
    SleepStep::ShowPowerOffNotice,
    SleepStep::ShowSleepNotice,
    SleepStep::HoldNotice,
    SleepStep::DisableButtonInterrupt,
    SleepStep::CloseGpsChannel,
    SleepStep::GpsPowerDown,
    SleepStep::BacklightOff,
    SleepStep::PeripheralRailOff,
    SleepStep::MotorOff,
    SleepStep::RadiosOff,
    SleepStep::WakePinPullUp,
    SleepStep::DisableWakeSources,
    SleepStep::EnableButtonWake,
    SleepStep::Settle,
    SleepStep::SystemOff,
];

/// One step of bringing the device back after a button wake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeStep {
    ReleaseHeldPins,
    PeripheralRailOn,
    BacklightOn,
    /// Includes the receiver start-up delay.
    GpsPowerOn,
    ReopenGpsChannel,
    ConfirmVibration,
}

pub const WAKE_SEQUENCE: [WakeStep; 6] = [
    WakeStep::ReleaseHeldPins,
    WakeStep::PeripheralRailOn,
    WakeStep::BacklightOn,
    WakeStep::GpsPowerOn,
    WakeStep::ReopenGpsChannel,
    WakeStep::ConfirmVibration,
];

/// Board operations used by the sleep and wake sequences.
pub trait SleepHardware {
    fn sleep_step(&mut self, step: SleepStep);
    fn wake_step(&mut self, step: WakeStep);
}

/// Why the chip is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeCause {
    /// Power-on or any reset that is not a System OFF wake.
    PowerOn,
    /// Woken from System OFF by a GPIO. `asserted` tells whether the
    /// button pin is the one that met its sense level.
    ButtonWake { asserted: bool },
    /// Woken from System OFF by something else.
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDecision {
    /// Fresh start at the welcome screen.
    ColdBoot,
    /// Genuine button wake: restart satellite acquisition.
    Resume,
    /// Spurious wake: straight back to sleep.
    ReSleep,
}

/// RESETREAS bit set when the chip left System OFF through a GPIO DETECT.
pub const RESETREAS_OFF: u32 = 1 << 16;
/// RESETREAS bits for the other System OFF wake sources (LPCOMP, debug
/// interface, NFC, VBUS).
pub const RESETREAS_OTHER_WAKE: u32 = (1 << 17) | (1 << 18) | (1 << 19) | (1 << 20);

/// Classify a boot from the reset reason register and whether the button
/// pin latched its sense level.
pub fn wake_cause(resetreas: u32, button_latched: bool) -> WakeCause {
    if resetreas & RESETREAS_OFF != 0 {
        WakeCause::ButtonWake {
            asserted: button_latched,
        }
    } else if resetreas & RESETREAS_OTHER_WAKE != 0 {
        WakeCause::Other
    } else {
        WakeCause::PowerOn
    }
}

pub fn boot_decision(cause: WakeCause) -> BootDecision {
    match cause {
        WakeCause::PowerOn => BootDecision::ColdBoot,
        WakeCause::ButtonWake { asserted: true } => BootDecision::Resume,
        WakeCause::ButtonWake { asserted: false } | WakeCause::Other => BootDecision::ReSleep,
    }
}

/// Run the full sleep sequence in order.
pub fn enter_sleep<H: SleepHardware>(hw: &mut H) {
    log_info!("entering sleep");
    for step in SLEEP_SEQUENCE {
        log_debug!("sleep step {:?}", step);
        hw.sleep_step(step);
    }
}

/// Act on the wake cause. Returns the decision taken.
pub fn handle_wake<H: SleepHardware>(cause: WakeCause, hw: &mut H) -> BootDecision {
    let decision = boot_decision(cause);
    match decision {
        BootDecision::ColdBoot => log_info!("cold boot"),
        BootDecision::Resume => {
            log_info!("button wake, resuming");
            for step in WAKE_SEQUENCE {
                hw.wake_step(step);
            }
        }
        BootDecision::ReSleep => {
            log_warn!("spurious wake ({:?}), back to sleep", cause);
            enter_sleep(hw);
        }
    }
    decision
}

/// No-input, no-motion time after which the device powers itself off.
pub fn idle_timeout_ms(mode: OperationMode) -> u64 {
    match mode {
        OperationMode::Flying => IDLE_POWER_OFF_FLYING_MS,
        OperationMode::Walking => IDLE_POWER_OFF_WALKING_MS,
    }
}

pub fn idle_power_off_due(mode: OperationMode, idle_ms: u64) -> bool {
    idle_ms >= idle_timeout_ms(mode)
}
