//! GPS receiver on UARTE at 9600 baud.
//!
//! Bytes are framed into sentences by [`NmeaLineAssembler`], decoded with
//! `nmea0183` (GGA and RMC only) and published as [`FixUpdate`]s for the
//! main loop. While the channel is closed (during sleep) incoming bytes
//! are discarded.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::fix::{FixUpdate, TimeOfDay};
use crate::nav::GeoPoint;
use crate::nmea_line::{gga_satellites, NmeaLineAssembler};
use defmt::{debug, warn};
use embassy_nrf::pac;
use embassy_nrf::timer::Instance as TimerInstance;
use embassy_nrf::uarte::{Instance, UarteRxWithIdle};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use nmea0183::{ParseResult, Parser, Sentence};

/// Cleared by the sleep sequence, set again on wake.
pub static GPS_CHANNEL_OPEN: AtomicBool = AtomicBool::new(true);

/// Decoded fix fields, newest last.
pub static FIX_UPDATES: Channel<CriticalSectionRawMutex, FixUpdate, 8> = Channel::new();

/// Stop the receiver DMA and its idle timer ahead of System OFF.
///
/// Works on UARTE0 and TIMER0, the instances the firmware wires to the
/// receiver. The pending read in [`gps_task`] is never polled again.
pub fn stop_receiver() {
    GPS_CHANNEL_OPEN.store(false, Ordering::Release);
    pac::UARTE0.tasks_stoprx().write_value(1);
    pac::TIMER0.tasks_stop().write_value(1);
}

/// Bytes read per DMA transfer; a transfer also ends on line idle.
const RX_CHUNK: usize = 64;

pub async fn gps_task<U: Instance, T: TimerInstance>(mut rx: UarteRxWithIdle<'static, U, T>) -> ! {
    let mut assembler = NmeaLineAssembler::new();
    let mut parser = Parser::new().sentence_filter(Sentence::RMC | Sentence::GGA);
    let mut chunk = [0u8; RX_CHUNK];

    loop {
        let n = match rx.read_until_idle(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                warn!("GPS UART error: {:?}", e);
                assembler.reset();
                Timer::after(Duration::from_millis(100)).await;
                continue;
            }
        };

        if !GPS_CHANNEL_OPEN.load(Ordering::Acquire) {
            assembler.reset();
            continue;
        }

        for &byte in &chunk[..n] {
            let Some(line) = assembler.push(byte) else {
                continue;
            };
            let update = decode(&mut parser, line);
            if update != FixUpdate::default() && FIX_UPDATES.try_send(update).is_err() {
                debug!("fix channel full, dropping update");
            }
        }
    }
}

/// Merge every field the sentence carries into one update.
fn decode(parser: &mut Parser, line: &[u8]) -> FixUpdate {
    let mut update = FixUpdate {
        // Also covers GGA sentences without a position.
        satellites: gga_satellites(line),
        ..Default::default()
    };

    for result in parser.parse_from_bytes(line) {
        match result {
            Ok(ParseResult::GGA(Some(gga))) => {
                update.location = GeoPoint::new(gga.latitude.as_f64(), gga.longitude.as_f64());
                update.altitude_m = Some(gga.altitude.meters);
                update.satellites = Some(gga.sat_in_use);
                update.time = time_of_day(&gga.time);
            }
            Ok(ParseResult::RMC(Some(rmc))) => {
                update.location = GeoPoint::new(rmc.latitude.as_f64(), rmc.longitude.as_f64());
                update.speed_kmph = Some(rmc.speed.as_kph());
                update.course_deg = rmc.course.map(|c| c.degrees);
                update.time = time_of_day(&rmc.datetime.time);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("NMEA parse error: {}", e);
            }
        }
    }
    update
}

fn time_of_day(t: &nmea0183::datetime::Time) -> Option<TimeOfDay> {
    TimeOfDay::new(t.hours, t.minutes, t.seconds as u8)
}
