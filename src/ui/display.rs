//! E-paper drawing.
//!
//! Screens are drawn with `embedded-graphics` into any 1-bit `DrawTarget`;
//! the embedded build points that at the 1.54" 200×200 panel buffer and
//! pushes a full refresh. Coordinates assume the 200×200 geometry.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10, FONT_9X18_BOLD};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle, Triangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use libm::{cos, sin};

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::nav;
use crate::settings::OperationMode;
use crate::ui::view::{CompassView, CoordinatesView, Frame, View};

/// Black pixel.
pub const INK: BinaryColor = BinaryColor::On;
/// White pixel.
pub const PAPER: BinaryColor = BinaryColor::Off;

const CENTER: Point = Point::new(100, 100);
const MARKER_RING_RADIUS: f64 = 80.0;
const SPEEDO_LABEL_RADIUS: f64 = 55.0;
const SPEEDO_NEEDLE: f64 = 70.0;
const SPEEDO_MAX_KMPH: u16 = 60;

fn style(font: &'static MonoFont<'static>, color: BinaryColor) -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(font, color)
}

/// Text centred on `at` both ways.
fn centered<D>(
    target: &mut D,
    text: &str,
    at: Point,
    font: &'static MonoFont<'static>,
    color: BinaryColor,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    Text::with_text_style(text, at, style(font, color), layout).draw(target)?;
    Ok(())
}

/// Text with its top-left corner at `at`.
fn top_left<D>(
    target: &mut D,
    text: &str,
    at: Point,
    font: &'static MonoFont<'static>,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Text::with_baseline(text, at, style(font, INK), Baseline::Top).draw(target)?;
    Ok(())
}

fn border<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Rectangle::new(Point::zero(), Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT))
        .into_styled(PrimitiveStyle::with_stroke(INK, 1))
        .draw(target)
}

fn battery<D>(target: &mut D, percent: u8, at: Point) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let mut text: heapless::String<5> = heapless::String::new();
    let _ = core::fmt::write(&mut text, format_args!("{}%", percent));
    top_left(target, &text, at, &FONT_6X10)
}

/// Render one complete frame.
pub fn draw_frame<D>(target: &mut D, frame: &Frame) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(PAPER)?;

    match &frame.view {
        View::Welcome => draw_welcome(target)?,
        View::Searching { satellites, time } => {
            draw_searching(target, *satellites, time)?;
            battery(target, frame.battery_percent, Point::new(160, 185))?;
        }
        View::Countdown {
            seconds,
            home_lat,
            home_lon,
        } => draw_countdown(target, *seconds, home_lat, home_lon)?,
        View::Compass(compass) => {
            draw_compass(target, compass)?;
            battery(target, frame.battery_percent, Point::new(3, 3))?;
            draw_mode(target, frame.mode)?;
        }
        View::Coordinates(coords) => draw_coordinates(target, coords)?,
        View::PowerOffNotice => draw_power_off(target)?,
        View::Sleep => draw_sleep(target)?,
    }

    if !frame.label.is_empty() {
        let at = match frame.view {
            View::Coordinates(_) => Point::new(180, 186),
            _ => Point::new(5, 186),
        };
        top_left(target, &frame.label, at, &FONT_6X10)?;
    }
    Ok(())
}

fn draw_welcome<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    border(target)?;
    centered(target, "HOMEWARD", Point::new(100, 25), &FONT_10X20, INK)?;

    // Sun over two peaks.
    Circle::with_center(Point::new(140, 70), 24)
        .into_styled(PrimitiveStyle::with_stroke(INK, 2))
        .draw(target)?;
    Triangle::new(Point::new(20, 150), Point::new(75, 70), Point::new(130, 150))
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)?;
    Triangle::new(Point::new(90, 150), Point::new(135, 95), Point::new(180, 150))
        .into_styled(PrimitiveStyle::with_stroke(INK, 2))
        .draw(target)?;
    // Snow cap.
    Triangle::new(Point::new(65, 84), Point::new(75, 70), Point::new(85, 84))
        .into_styled(PrimitiveStyle::with_fill(PAPER))
        .draw(target)?;

    centered(target, "RETURN TO HOME", Point::new(100, 168), &FONT_6X10, INK)
}

fn draw_searching<D>(target: &mut D, satellites: u8, time: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    border(target)?;
    centered(target, "GPS SEARCH", Point::new(100, 20), &FONT_10X20, INK)?;
    centered(target, "Satellites:", Point::new(100, 60), &FONT_9X18_BOLD, INK)?;

    let mut count: heapless::String<4> = heapless::String::new();
    let _ = core::fmt::write(&mut count, format_args!("{}", satellites));
    centered(target, &count, Point::new(100, 88), &FONT_10X20, INK)?;

    centered(target, "GPS Time:", Point::new(100, 128), &FONT_9X18_BOLD, INK)?;
    centered(target, time, Point::new(100, 152), &FONT_10X20, INK)
}

fn draw_countdown<D>(target: &mut D, seconds: u8, home_lat: &str, home_lon: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    centered(target, "Press button", Point::new(100, 20), &FONT_10X20, INK)?;
    centered(target, "to set new", Point::new(100, 45), &FONT_10X20, INK)?;
    centered(target, "home point", Point::new(100, 70), &FONT_10X20, INK)?;

    let mut digits: heapless::String<4> = heapless::String::new();
    let _ = core::fmt::write(&mut digits, format_args!("{}", seconds));
    centered(target, &digits, Point::new(100, 105), &FONT_10X20, INK)?;

    let mut line: heapless::String<24> = heapless::String::new();
    let _ = core::fmt::write(&mut line, format_args!("Lat: {}", home_lat));
    top_left(target, &line, Point::new(10, 140), &FONT_9X18_BOLD)?;
    line.clear();
    let _ = core::fmt::write(&mut line, format_args!("Lon: {}", home_lon));
    top_left(target, &line, Point::new(10, 165), &FONT_9X18_BOLD)
}

fn draw_compass<D>(target: &mut D, view: &CompassView) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    border(target)?;

    Circle::with_center(CENTER, 57)
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)?;
    for diameter in [141, 191, 193] {
        Circle::with_center(CENTER, diameter)
            .into_styled(PrimitiveStyle::with_stroke(INK, 1))
            .draw(target)?;
    }

    draw_speedometer(target, view.speed_kmph)?;

    // Direction of travel is always up.
    Triangle::new(
        CENTER + Point::new(0, -28),
        CENTER + Point::new(-10, -10),
        CENTER + Point::new(10, -10),
    )
    .into_styled(PrimitiveStyle::with_fill(PAPER))
    .draw(target)?;

    let (dx, dy) = nav::marker_offset(view.relative_bearing, MARKER_RING_RADIUS);
    let marker_at = CENTER + Point::new(dx, dy);
    Circle::with_center(marker_at, 25)
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)?;
    let mut glyph = [0u8; 4];
    centered(
        target,
        view.marker.encode_utf8(&mut glyph),
        marker_at,
        &FONT_10X20,
        PAPER,
    )?;

    centered(target, &view.fuel, CENTER + Point::new(0, 8), &FONT_10X20, PAPER)?;
    centered(target, &view.distance, CENTER + Point::new(0, 40), &FONT_10X20, INK)
}

/// Half dial across the top of the compass: 0 km/h on the left, 60 on
/// the right.
fn draw_speedometer<D>(target: &mut D, speed_kmph: u16) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let point_at = |kmph: u16, radius: f64| {
        let angle = (180.0 + kmph as f64 * 180.0 / SPEEDO_MAX_KMPH as f64).to_radians();
        CENTER + Point::new((radius * cos(angle)) as i32, (radius * sin(angle)) as i32)
    };

    let mut label: heapless::String<3> = heapless::String::new();
    for kmph in (0..=SPEEDO_MAX_KMPH).step_by(10) {
        label.clear();
        let _ = core::fmt::write(&mut label, format_args!("{}", kmph));
        centered(target, &label, point_at(kmph, SPEEDO_LABEL_RADIUS), &FONT_6X10, INK)?;
    }

    let tip = point_at(speed_kmph.min(SPEEDO_MAX_KMPH), SPEEDO_NEEDLE);
    Line::new(CENTER, tip)
        .into_styled(PrimitiveStyle::with_stroke(INK, 2))
        .draw(target)
}

fn draw_mode<D>(target: &mut D, mode: OperationMode) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let glyph = match mode {
        OperationMode::Flying => "FLY",
        OperationMode::Walking => "WALK",
    };
    Text::with_text_style(
        glyph,
        Point::new(196, 3),
        style(&FONT_6X10, INK),
        TextStyleBuilder::new()
            .alignment(Alignment::Right)
            .baseline(Baseline::Top)
            .build(),
    )
    .draw(target)?;
    Ok(())
}

fn draw_coordinates<D>(target: &mut D, view: &CoordinatesView) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    border(target)?;
    centered(target, "GPS DATA", Point::new(100, 18), &FONT_10X20, INK)?;

    let mut sats: heapless::String<4> = heapless::String::new();
    let _ = core::fmt::write(&mut sats, format_args!("{}", view.satellites));

    let rows: [(&str, &str); 6] = [
        ("Lat:", view.latitude.as_str()),
        ("Lon:", view.longitude.as_str()),
        ("Alt:", view.altitude.as_str()),
        ("Spd:", view.speed.as_str()),
        ("Sats:", sats.as_str()),
        ("Time:", view.time.as_str()),
    ];
    for (row, (label, value)) in rows.iter().enumerate() {
        let y = 40 + row as i32 * 24;
        top_left(target, label, Point::new(8, y), &FONT_9X18_BOLD)?;
        top_left(target, value, Point::new(62, y), &FONT_9X18_BOLD)?;
    }
    Ok(())
}

fn draw_power_off<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    border(target)?;
    centered(target, "Auto", Point::new(100, 80), &FONT_10X20, INK)?;
    centered(target, "power off", Point::new(100, 110), &FONT_10X20, INK)
}

fn draw_sleep<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let face = Point::new(100, 90);
    Circle::with_center(face, 61)
        .into_styled(PrimitiveStyle::with_stroke(INK, 2))
        .draw(target)?;

    // Closed eyes.
    for x in [-10, 10] {
        Line::new(face + Point::new(x - 5, -8), face + Point::new(x + 5, -8))
            .into_styled(PrimitiveStyle::with_stroke(INK, 2))
            .draw(target)?;
    }

    let smile = [
        Point::new(-15, 10),
        Point::new(-10, 15),
        Point::new(0, 18),
        Point::new(10, 15),
        Point::new(15, 10),
    ];
    for pair in smile.windows(2) {
        Line::new(face + pair[0], face + pair[1])
            .into_styled(PrimitiveStyle::with_stroke(INK, 1))
            .draw(target)?;
    }

    centered(target, "Going to sleep", Point::new(100, 150), &FONT_10X20, INK)
}

// - Panel (embedded only) -------------------------------------------

#[cfg(feature = "embedded")]
pub use panel::EpaperPanel;

#[cfg(feature = "embedded")]
mod panel {
    use embedded_graphics::pixelcolor::BinaryColor;
    use embedded_graphics::prelude::*;
    use embedded_hal::delay::DelayNs;
    use embedded_hal::digital::{InputPin, OutputPin};
    use embedded_hal::spi::SpiDevice;
    use epd_waveshare::epd1in54_v2::{Display1in54, Epd1in54};
    use epd_waveshare::prelude::*;

    use super::draw_frame;
    use crate::error::Error;
    use crate::ui::view::Frame;

    /// Waveshare 1.54" v2 panel with its frame buffer.
    pub struct EpaperPanel<SPI, BUSY, DC, RST, DELAY>
    where
        SPI: SpiDevice,
        BUSY: InputPin,
        DC: OutputPin,
        RST: OutputPin,
        DELAY: DelayNs,
    {
        spi: SPI,
        epd: Epd1in54<SPI, BUSY, DC, RST, DELAY>,
        buffer: Display1in54,
        delay: DELAY,
    }

    impl<SPI, BUSY, DC, RST, DELAY> EpaperPanel<SPI, BUSY, DC, RST, DELAY>
    where
        SPI: SpiDevice,
        BUSY: InputPin,
        DC: OutputPin,
        RST: OutputPin,
        DELAY: DelayNs,
    {
        /// Reset and initialise the controller.
        pub fn new(mut spi: SPI, busy: BUSY, dc: DC, rst: RST, mut delay: DELAY) -> Result<Self, Error> {
            let epd = Epd1in54::new(&mut spi, busy, dc, rst, &mut delay, None)
                .map_err(|_| Error::Display)?;
            Ok(Self {
                spi,
                epd,
                buffer: Display1in54::default(),
                delay,
            })
        }

        /// Draw `frame` and run a full refresh.
        pub fn show(&mut self, frame: &Frame) -> Result<(), Error> {
            let mut canvas = self.buffer.color_converted::<BinaryColor>();
            draw_frame(&mut canvas, frame).map_err(|_| Error::Display)?;
            self.epd
                .update_and_display_frame(&mut self.spi, self.buffer.buffer(), &mut self.delay)
                .map_err(|_| Error::Display)
        }

        /// Wake the controller after `sleep`.
        pub fn wake(&mut self) -> Result<(), Error> {
            self.epd
                .wake_up(&mut self.spi, &mut self.delay)
                .map_err(|_| Error::Display)
        }

        /// Deep-sleep the controller. The image stays on the glass.
        pub fn sleep(&mut self) -> Result<(), Error> {
            self.epd
                .sleep(&mut self.spi, &mut self.delay)
                .map_err(|_| Error::Display)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::view::{self, Text};
    use crate::ui::ActiveScreen;

    /// 200×200 1-bit canvas.
    struct Canvas {
        pixels: std::vec::Vec<bool>,
    }

    impl Canvas {
        fn new() -> Self {
            Self {
                pixels: vec![false; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
            }
        }

        fn ink(&self, x: i32, y: i32) -> bool {
            self.pixels[(y as u32 * DISPLAY_WIDTH + x as u32) as usize]
        }

        fn ink_count(&self) -> usize {
            self.pixels.iter().filter(|&&p| p).count()
        }
    }

    impl OriginDimensions for Canvas {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        }
    }

    impl DrawTarget for Canvas {
        type Color = BinaryColor;
        type Error = core::convert::Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(p, color) in pixels {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < DISPLAY_WIDTH && (p.y as u32) < DISPLAY_HEIGHT {
                    self.pixels[(p.y as u32 * DISPLAY_WIDTH + p.x as u32) as usize] = color.is_on();
                }
            }
            Ok(())
        }
    }

    fn text(s: &str) -> Text {
        let mut t = Text::new();
        t.push_str(s).unwrap();
        t
    }

    fn compass_frame(relative_bearing: f64) -> Frame {
        Frame {
            view: View::Compass(CompassView {
                marker: 'H',
                relative_bearing,
                fuel: text("12"),
                distance: text("3.4"),
                speed_kmph: 0,
            }),
            battery_percent: 77,
            mode: OperationMode::Flying,
            label: text("5"),
        }
    }

    #[test]
    fn every_screen_draws_something() {
        let config = crate::settings::PersistedConfig::default();
        let fix = crate::fix::NavigationFix::default();
        for screen in [
            ActiveScreen::Welcome,
            ActiveScreen::SearchingSatellites,
            ActiveScreen::Countdown(10),
            ActiveScreen::Home,
            ActiveScreen::Poi(0),
            ActiveScreen::Coordinates,
            ActiveScreen::AutoPowerOffNotice,
            ActiveScreen::Sleeping,
        ] {
            let mut canvas = Canvas::new();
            draw_frame(&mut canvas, &view::frame(screen, &config, &fix, 50)).unwrap();
            assert!(canvas.ink_count() > 100, "{:?} drew almost nothing", screen);
        }
    }

    #[test]
    fn compass_marker_follows_relative_bearing() {
        let mut ahead = Canvas::new();
        draw_frame(&mut ahead, &compass_frame(0.0)).unwrap();
        assert!(ahead.ink(110, 20));
        assert!(!ahead.ink(190, 100));

        let mut right = Canvas::new();
        draw_frame(&mut right, &compass_frame(90.0)).unwrap();
        assert!(right.ink(190, 100));
        assert!(!right.ink(110, 20));
    }

    #[test]
    fn compass_hub_is_filled() {
        let mut canvas = Canvas::new();
        draw_frame(&mut canvas, &compass_frame(0.0)).unwrap();
        assert!(canvas.ink(100, 124));
    }

    #[test]
    fn redraw_clears_previous_frame() {
        let mut canvas = Canvas::new();
        draw_frame(&mut canvas, &compass_frame(0.0)).unwrap();
        let sleep = Frame {
            view: View::Sleep,
            battery_percent: 0,
            mode: OperationMode::Flying,
            label: Text::new(),
        };
        draw_frame(&mut canvas, &sleep).unwrap();
        assert!(!canvas.ink(110, 20));
        assert!(!canvas.ink(0, 0));
    }
}
