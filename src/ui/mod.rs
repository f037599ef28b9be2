//! User interface - e-paper screens and the single push button.
//!
//! ## Components
//!
//! - **Input logic**: gesture classification and screen cycling (pure)
//! - **View**: what each screen shows, derived from state and fix (pure)
//! - **Display**: `embedded-graphics` drawing for every screen
//! - **Buttons**: edge detector task feeding the main loop (embedded only)

#[cfg(feature = "embedded")]
pub mod buttons;
pub mod display;
pub mod input_logic;
pub mod view;

/// The one screen currently shown. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveScreen {
    /// Boot artwork.
    Welcome,
    /// Waiting for enough satellites.
    SearchingSatellites,
    /// Set-home countdown; the number currently shown.
    Countdown(u8),
    /// Compass towards home.
    Home,
    /// Compass towards POI slot (0-based).
    Poi(usize),
    /// Raw fix values.
    Coordinates,
    /// First notice of the sleep sequence.
    AutoPowerOffNotice,
    /// Sleep face. Last frame before System OFF.
    Sleeping,
}

impl ActiveScreen {
    /// Home, POI and Coordinates screens.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            ActiveScreen::Home | ActiveScreen::Poi(_) | ActiveScreen::Coordinates
        )
    }
}

/// Debounced button gestures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    /// Debounced down edge.
    Press,
    /// Release after a short hold, not followed by a second tap.
    ShortPress,
    /// Two short releases in quick succession.
    DoubleTap,
    /// Held past the long-press threshold; fires while still held.
    LongPress,
}
