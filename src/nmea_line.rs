//! NMEA byte-stream framing.
//!
//! The receiver streams CRLF-terminated sentences. [`NmeaLineAssembler`]
//! cuts the stream into complete sentences for the parser and resyncs on
//! the next `$` after garbage or an overlong line.

use heapless::Vec;

use crate::config::NMEA_MAX_SENTENCE;

pub struct NmeaLineAssembler {
    buf: Vec<u8, NMEA_MAX_SENTENCE>,
    complete: bool,
}

impl NmeaLineAssembler {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            complete: false,
        }
    }

    /// Feed one byte. Returns a complete sentence (with the trailing CRLF)
    /// once its `\n` arrives.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }

        if byte == b'$' {
            // Start of sentence always resyncs, even mid-line.
            self.buf.clear();
        } else if self.buf.is_empty() {
            // Outside a sentence: drop until the next '$'.
            return None;
        }

        if self.buf.push(byte).is_err() {
            // Dropping the partial line makes us skip the rest of it.
            self.buf.clear();
            log_warn!("NMEA sentence too long, dropped");
            return None;
        }

        if byte == b'\n' {
            // Handed out by reference; cleared on the next byte.
            self.complete = true;
            return Some(self.buf.as_slice());
        }
        None
    }

    /// Forget the current partial sentence.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.complete = false;
    }
}

impl Default for NmeaLineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Satellites-in-use field of a `$--GGA` sentence.
///
/// Parsers typically discard GGA sentences without a position; the search
/// screen still needs this count while the receiver is acquiring.
pub fn gga_satellites(line: &[u8]) -> Option<u8> {
    let line = core::str::from_utf8(line).ok()?;
    let body = line.strip_prefix('$')?;
    let body = body.split('*').next()?;
    let mut fields = body.split(',');
    let talker = fields.next()?;
    if talker.len() != 5 || !talker.ends_with("GGA") {
        return None;
    }
    // time, lat, N/S, lon, E/W, quality, satellites
    fields.nth(6)?.trim().parse::<u8>().ok()
}
