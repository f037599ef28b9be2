//! Button edge detector.
//!
//! The single button is active-low with the internal pull-up. This task
//! owns the pin and only publishes two flags: the current level in
//! [`BUTTON_DOWN`] and a latched falling edge in [`EDGE_LATCH`]. Debouncing
//! and gesture timing happen in the main loop's [`ButtonTracker`]; the
//! latch makes a press shorter than one tick visible to it.
//!
//! [`ButtonTracker`]: crate::ui::input_logic::ButtonTracker

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::debug;
use embassy_nrf::gpio::Input;

/// Level at the last edge: `true` while pressed.
pub static BUTTON_DOWN: AtomicBool = AtomicBool::new(false);

/// A falling edge has been seen since the main loop last looked.
pub static EDGE_LATCH: AtomicBool = AtomicBool::new(false);

/// Cleared by the sleep sequence so late bounces are ignored.
pub static BUTTON_ARMED: AtomicBool = AtomicBool::new(true);

pub async fn button_task(mut button: Input<'static>) -> ! {
    BUTTON_DOWN.store(button.is_low(), Ordering::Release);

    loop {
        button.wait_for_any_edge().await;
        if !BUTTON_ARMED.load(Ordering::Acquire) {
            continue;
        }
        let down = button.is_low();
        BUTTON_DOWN.store(down, Ordering::Release);
        if down {
            debug!("button edge");
            EDGE_LATCH.store(true, Ordering::Release);
        }
    }
}

/// Sample for one main-loop tick: `(level_down, edge_latched)`.
/// Reading clears the latch.
pub fn sample() -> (bool, bool) {
    (
        BUTTON_DOWN.load(Ordering::Acquire),
        EDGE_LATCH.swap(false, Ordering::AcqRel),
    )
}
