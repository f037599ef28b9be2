//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Main loop

/// Cooperative poll period of the main loop (ms).
pub const LOOP_PERIOD_MS: u64 = 20;

// Screens & redraw cadence

/// How long the welcome artwork stays up at cold boot (ms).
pub const WELCOME_DURATION_MS: u64 = 1_000;

/// Redraw cadence of the satellite search screen (ms).
pub const SEARCH_REDRAW_MS: u64 = 5_000;

/// Redraw cadence of the navigation screens (Home / POI / Coordinates) (ms).
pub const NAV_REDRAW_MS: u64 = 2_000;

/// Satellites in use required to leave the search screen.
pub const MIN_SATELLITES_FOR_FIX: u8 = 3;

/// First number shown by the set-home countdown.
pub const COUNTDOWN_START: u8 = 10;

/// Duration of one countdown step (ms).
pub const COUNTDOWN_STEP_MS: u64 = 1_000;

/// Interval of the fix summary log while no home point is set (ms).
pub const FIX_LOG_INTERVAL_MS: u64 = 2_000;

// Button gestures
//
//   Button (active-low, pull-up, also the System OFF wake source) → P0.11

/// Port 0 pin number of the button, for register-level wake configuration.
pub const BUTTON_PIN: usize = 11;

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// A release before this hold time counts as a short press (ms).
pub const SHORT_PRESS_MAX_MS: u64 = 1_000;

/// Two short releases closer than this form a double-tap (ms).
pub const DOUBLE_TAP_WINDOW_MS: u64 = 500;

/// Hold time that requests sleep (ms).
pub const LONG_PRESS_MS: u64 = 3_000;

// Idle auto power-off

/// No input and no motion for this long powers the device off in Flying mode (ms).
pub const IDLE_POWER_OFF_FLYING_MS: u64 = 30 * 60 * 1_000;

/// No input and no motion for this long powers the device off in Walking mode (ms).
pub const IDLE_POWER_OFF_WALKING_MS: u64 = 15 * 60 * 1_000;

// Fuel model

/// Speed above which the vehicle is considered moving (5 mph in km/h).
pub const MOTION_THRESHOLD_KMPH: f32 = 8.046_72;

/// Fuel level used when the stored value is missing or out of range (L).
pub const DEFAULT_FUEL_LEVEL_L: f64 = 12.0;

/// Burn rate used when the stored value is missing or out of range (L/h).
pub const DEFAULT_BURN_RATE_LPH: f64 = 4.5;

/// Upper bound accepted for the fuel level (L).
pub const MAX_FUEL_LEVEL_L: f64 = 100.0;

/// Upper bound accepted for the burn rate (L/h).
pub const MAX_BURN_RATE_LPH: f64 = 10.0;

// Haptics & sound

/// Motor pulse confirming a wake-up or a captured home point (ms).
pub const VIBRATION_CONFIRM_MS: u64 = 200;

/// Buzzer tone frequency (Hz).
pub const BUZZER_FREQUENCY_HZ: u32 = 1_000;

/// Buzzer tone duration (ms).
pub const BUZZER_DURATION_MS: u64 = 250;

// Power sequencing

/// Time the sleep notice stays on screen before the rails drop (ms).
pub const SLEEP_NOTICE_HOLD_MS: u64 = 2_000;

/// Settle delay between arming the wake source and System OFF (ms).
pub const SLEEP_SETTLE_MS: u64 = 1_000;

/// GPS start-up time after its reset line is released (ms).
pub const GPS_POWER_UP_MS: u64 = 200;

// GPS
//
//   GPS RX (module TX)  → P0.21
//   GPS TX (module RX)  → P0.22
//   GPS reset/enable    → P0.23
//   UART 9600 baud, 8N1

/// Longest NMEA sentence we accept, including `$` and CRLF.
pub const NMEA_MAX_SENTENCE: usize = 96;

// Battery
//
//   Battery sense divider → AIN0 (P0.02)

/// ADC samples averaged per battery reading.
pub const BATTERY_SAMPLES: usize = 25;

/// Sense voltage reported as an empty battery (mV at the ADC pin).
pub const BATTERY_EMPTY_MV: u32 = 1_630;

/// Sense voltage reported as a full battery (mV at the ADC pin).
pub const BATTERY_FULL_MV: u32 = 1_850;

/// Ratio of the battery sense divider.
pub const BATTERY_DIVIDER: u32 = 2;

// Display
//
//   EPD SCK   → P0.14      EPD MOSI → P0.13
//   EPD CS    → P0.15      EPD DC   → P0.03
//   EPD RESET → P0.17      EPD BUSY → P0.16
//   Backlight → P0.26      Rail EN  → P0.05
//   Motor     → P0.04      Buzzer   → P0.27

/// Panel width (px).
pub const DISPLAY_WIDTH: u32 = 200;

/// Panel height (px).
pub const DISPLAY_HEIGHT: u32 = 200;

// BLE

/// Advertised device name.
pub const BLE_DEVICE_NAME: &str = "Homeward";

/// Drop the link and power the radio down after this long without a write (s).
pub const BLE_IDLE_TIMEOUT_SECS: u64 = 5 * 60;

/// Largest command accepted on the write characteristic (bytes).
pub const BLE_COMMAND_MAX: usize = 128;

/// Largest status report notified in one packet (bytes).
pub const BLE_REPORT_MAX: usize = 244;

/// ATT MTU requested from the SoftDevice.
pub const BLE_ATT_MTU: u16 = 247;

// Persisted configuration

/// Size of the flat configuration image (bytes).
pub const CONFIG_IMAGE_SIZE: usize = 512;

/// Flash page index where configuration storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for configuration storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
