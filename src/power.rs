//! nRF52840 side of sleep and wake.
//!
//! [`NrfPower`] carries out the steps chosen by [`crate::power_logic`]:
//! notices are drawn through a caller-supplied render hook, outputs are
//! dropped through [`Board`], and the wake source is configured directly
//! in the GPIO registers because System OFF sense is not exposed by the
//! HAL.
//!
//! nRF52840 power modes used here:
//! - System ON: normal operation
//! - System OFF: deep sleep (~0.4 µA), wake on button DETECT, boot is a reset

use core::sync::atomic::Ordering;

use crate::ble::server;
use crate::board::Board;
use crate::config::{
    BUTTON_PIN, GPS_POWER_UP_MS, SLEEP_NOTICE_HOLD_MS, SLEEP_SETTLE_MS, VIBRATION_CONFIRM_MS,
};
use crate::gps::{self, GPS_CHANNEL_OPEN};
use crate::power_logic::{self, SleepHardware, SleepStep, WakeCause, WakeStep};
use crate::ui::buttons::BUTTON_ARMED;
use crate::ui::ActiveScreen;
use defmt::{info, warn};
use embassy_nrf::pac;
use embassy_nrf::pac::gpio::vals::{Dir, Input, Pull, Sense};
use embassy_time::{block_for, Duration};

/// Pins on port 0 and port 1.
const P0_PINS: usize = 32;
const P1_PINS: usize = 16;

/// Board access for the sleep and wake sequences.
///
/// `render` draws a full screen and returns once the panel has refreshed.
pub struct NrfPower<'a, R> {
    board: &'a mut Board,
    render: R,
}

impl<'a, R: FnMut(ActiveScreen)> NrfPower<'a, R> {
    pub fn new(board: &'a mut Board, render: R) -> Self {
        Self { board, render }
    }
}

impl<R: FnMut(ActiveScreen)> SleepHardware for NrfPower<'_, R> {
    fn sleep_step(&mut self, step: SleepStep) {
        match step {
            SleepStep::ShowPowerOffNotice => (self.render)(ActiveScreen::AutoPowerOffNotice),
            SleepStep::ShowSleepNotice => (self.render)(ActiveScreen::Sleeping),
            SleepStep::HoldNotice => block_for(Duration::from_millis(SLEEP_NOTICE_HOLD_MS)),
            SleepStep::DisableButtonInterrupt => BUTTON_ARMED.store(false, Ordering::Release),
            SleepStep::CloseGpsChannel => gps::stop_receiver(),
            SleepStep::GpsPowerDown => self.board.gps_enable.set_low(),
            SleepStep::BacklightOff => self.board.backlight.set_low(),
            SleepStep::PeripheralRailOff => self.board.rail.set_low(),
            SleepStep::MotorOff => {
                self.board.motor.set_low();
                self.board.buzzer.set_low();
            }
            SleepStep::RadiosOff => {
                if let Err(e) = server::stop_radio() {
                    warn!("radio not stopped cleanly: {:?}", e);
                }
            }
            SleepStep::WakePinPullUp => pac::P0.pin_cnf(BUTTON_PIN).write(|w| {
                w.set_dir(Dir::INPUT);
                w.set_input(Input::CONNECT);
                w.set_pull(Pull::PULLUP);
                w.set_sense(Sense::DISABLED);
            }),
            SleepStep::DisableWakeSources => {
                for n in 0..P0_PINS {
                    pac::P0.pin_cnf(n).modify(|w| w.set_sense(Sense::DISABLED));
                }
                for n in 0..P1_PINS {
                    pac::P1.pin_cnf(n).modify(|w| w.set_sense(Sense::DISABLED));
                }
                clear_button_latch();
            }
            SleepStep::EnableButtonWake => {
                pac::P0
                    .pin_cnf(BUTTON_PIN)
                    .modify(|w| w.set_sense(Sense::LOW));
            }
            SleepStep::Settle => block_for(Duration::from_millis(SLEEP_SETTLE_MS)),
            SleepStep::SystemOff => system_off(),
        }
    }

    fn wake_step(&mut self, step: WakeStep) {
        match step {
            WakeStep::ReleaseHeldPins => {
                pac::P0
                    .pin_cnf(BUTTON_PIN)
                    .modify(|w| w.set_sense(Sense::DISABLED));
                clear_button_latch();
            }
            WakeStep::PeripheralRailOn => self.board.rail.set_high(),
            WakeStep::BacklightOn => self.board.backlight.set_high(),
            WakeStep::GpsPowerOn => {
                self.board.gps_enable.set_high();
                block_for(Duration::from_millis(GPS_POWER_UP_MS));
            }
            WakeStep::ReopenGpsChannel => GPS_CHANNEL_OPEN.store(true, Ordering::Release),
            WakeStep::ConfirmVibration => self.board.vibrate_blocking(VIBRATION_CONFIRM_MS),
        }
    }
}

/// Read and clear the reset reason. Must run before the SoftDevice owns
/// the POWER peripheral.
pub fn read_wake_cause() -> WakeCause {
    let reas = pac::POWER.resetreas().read();
    // Bits are cleared by writing ones.
    pac::POWER.resetreas().write_value(reas);

    let latch = pac::P0.latch().read().0;
    let cause = power_logic::wake_cause(reas.0, latch & (1 << BUTTON_PIN) != 0);
    info!("reset reason {=u32:#x}: {:?}", reas.0, cause);
    cause
}

fn clear_button_latch() {
    pac::P0
        .latch()
        .write_value(pac::gpio::regs::Latch(1 << BUTTON_PIN));
}

fn system_off() -> ! {
    info!("System OFF");
    // Only succeeds with the SoftDevice enabled; otherwise fall through to
    // the register.
    let ret = unsafe { nrf_softdevice::raw::sd_power_system_off() };
    warn!("sd_power_system_off returned {}, using POWER directly", ret);
    pac::POWER.systemoff().write(|w| w.set_systemoff(true));
    loop {
        cortex_m::asm::wfe();
    }
}
