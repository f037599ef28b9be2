//! Board-level outputs: vibration motor, buzzer, backlight, peripheral
//! rail, GPS reset line, plus battery sampling on the SAADC.
//!
//! Every output is push-pull and starts low, except the rail and the GPS
//! which are brought up by [`Board::power_up`].

use crate::battery::{saadc_to_mv, BatteryReading};
use crate::config::{
    BATTERY_SAMPLES, BUZZER_DURATION_MS, BUZZER_FREQUENCY_HZ, GPS_POWER_UP_MS,
    VIBRATION_CONFIRM_MS,
};
use defmt::{debug, info};
use embassy_nrf::gpio::Output;
use embassy_nrf::saadc::Saadc;
use embassy_time::{block_for, Duration, Timer};

pub struct Board {
    pub motor: Output<'static>,
    pub buzzer: Output<'static>,
    pub backlight: Output<'static>,
    pub rail: Output<'static>,
    pub gps_enable: Output<'static>,
}

impl Board {
    pub fn new(
        motor: Output<'static>,
        buzzer: Output<'static>,
        backlight: Output<'static>,
        rail: Output<'static>,
        gps_enable: Output<'static>,
    ) -> Self {
        Self {
            motor,
            buzzer,
            backlight,
            rail,
            gps_enable,
        }
    }

    /// Rail, backlight and GPS on. Blocks for the GPS start-up time.
    pub fn power_up(&mut self) {
        self.rail.set_high();
        self.backlight.set_high();
        self.gps_enable.set_high();
        block_for(Duration::from_millis(GPS_POWER_UP_MS));
        info!("peripherals powered");
    }

    pub async fn vibrate(&mut self, ms: u64) {
        self.motor.set_high();
        Timer::after(Duration::from_millis(ms)).await;
        self.motor.set_low();
    }

    /// Blocking variant for the wake sequence, which runs before the
    /// executor is busy.
    pub fn vibrate_blocking(&mut self, ms: u64) {
        self.motor.set_high();
        block_for(Duration::from_millis(ms));
        self.motor.set_low();
    }

    /// Cold-boot greeting: two pulses.
    pub async fn double_pulse(&mut self) {
        self.vibrate(VIBRATION_CONFIRM_MS).await;
        Timer::after(Duration::from_millis(VIBRATION_CONFIRM_MS / 2)).await;
        self.vibrate(VIBRATION_CONFIRM_MS).await;
    }

    /// Square wave on the piezo, driven from the timer queue.
    pub async fn beep(&mut self) {
        let half_period = Duration::from_micros(500_000 / BUZZER_FREQUENCY_HZ as u64);
        let cycles = BUZZER_DURATION_MS * BUZZER_FREQUENCY_HZ as u64 / 1_000;
        for _ in 0..cycles {
            self.buzzer.set_high();
            Timer::after(half_period).await;
            self.buzzer.set_low();
            Timer::after(half_period).await;
        }
    }
}

/// Average [`BATTERY_SAMPLES`] conversions of the sense divider.
pub async fn sample_battery(adc: &mut Saadc<'_, 1>) -> Option<BatteryReading> {
    let mut samples = [0u32; BATTERY_SAMPLES];
    for slot in samples.iter_mut() {
        let mut buf = [0i16; 1];
        adc.sample(&mut buf).await;
        *slot = saadc_to_mv(buf[0]);
    }
    let reading = BatteryReading::from_samples(&samples);
    if let Some(r) = &reading {
        debug!("battery {} mV ({}%)", r.sense_mv, r.percent());
    }
    reading
}
