//! Homeward: return-to-home and point-of-interest GPS compass.
//!
//! Everything that does not touch a peripheral lives in this library so it
//! can be tested on the host: navigation math, fix ingestion, the fuel
//! estimator, the persisted configuration layout, remote commands, gesture
//! classification, the screen state machine, power sequencing policy and
//! screen drawing against any `embedded-graphics` target.
//!
//! Usage: `cargo test --lib` (host) or
//! `cargo run --release --features embedded` (nRF52840 + probe-rs).
//!
//! With the `embedded` feature the hardware glue (GPS UART, flash, BLE,
//! board outputs, System OFF) is compiled in as well and used by `main.rs`.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod battery;
pub mod config;
pub mod controller;
pub mod error;
pub mod fix;
pub mod fuel;
pub mod nav;
pub mod nmea_line;
pub mod power_logic;
pub mod remote;
pub mod settings;
pub mod ui;

#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod board;
#[cfg(feature = "embedded")]
pub mod gps;
#[cfg(feature = "embedded")]
pub mod power;
#[cfg(feature = "embedded")]
pub mod storage;

pub use controller::{Controller, DeviceState, Effect, Effects, LinkState};
pub use error::{BleError, Error};

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module Tests
// ═══════════════════════════════════════════════════════════════════════════
