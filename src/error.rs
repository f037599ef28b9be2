//! Unified error type for homeward.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The SoftDevice returned a BLE-level error.
    Ble(BleError),

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    // Display
    /// SPI transaction to the e-paper panel failed.
    Display,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// Advertising could not start.
    AdvertiseFailed,
    /// The status characteristic value could not be updated.
    StatusUpdate,
    /// Notification to the central failed.
    NotifyFailed,
    /// The SoftDevice refused to drop the connection.
    DisconnectFailed,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}
