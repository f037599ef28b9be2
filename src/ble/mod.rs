//! Bluetooth Low Energy configuration link.
//!
//! The SoftDevice S140 runs in **Peripheral** role with one custom GATT
//! service (see [`server`]): the phone writes text commands and reads or
//! subscribes to the status report.
//!
//! The BLE task never touches device state. It publishes into the statics
//! below and the main loop drains them every tick:
//!
//! - [`COMMANDS`]: raw command writes, parsed by the controller
//! - [`LINK_EVENTS`]: advertising / connected / radio off
//! - [`REPORTS`]: latest status report to notify, produced by the main loop

pub mod server;

use core::sync::atomic::{AtomicBool, AtomicU16};

use crate::config::BLE_COMMAND_MAX;
use crate::controller::LinkState;
use crate::remote::report::ReportLine;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;

/// One write on the command characteristic.
pub type CommandBytes = Vec<u8, BLE_COMMAND_MAX>;

/// Cleared by the idle timeout or the sleep sequence. Once cleared the
/// radio stays off until the next boot.
pub static RADIO_ENABLED: AtomicBool = AtomicBool::new(true);

/// Value of [`CONN_HANDLE`] while no central is connected.
pub const NO_CONNECTION: u16 = nrf_softdevice::raw::BLE_CONN_HANDLE_INVALID as u16;

/// SoftDevice handle of the open connection, for [`server::stop_radio`].
pub static CONN_HANDLE: AtomicU16 = AtomicU16::new(NO_CONNECTION);

pub static COMMANDS: Channel<CriticalSectionRawMutex, CommandBytes, 4> = Channel::new();

pub static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkState, 4> = Channel::new();

/// Only the newest report matters.
pub static REPORTS: Signal<CriticalSectionRawMutex, ReportLine> = Signal::new();
