//! GPS speed source: byte-stream line assembly and RMC-style field parsing.
//!
//! Wire format (only the fields we read are named):
//! ```text
//! $GPRMC,hhmmss.ss,A,llll.ll,a,yyyyy.yy,a,x.x,...*hh<CR><LF>
//!   [0]     [1]   [2]  [3]  [4]  [5]  [6] [7]
//!                  │                       └─ speed over ground (knots)
//!                  └─ status: 'A' = fix valid, anything else = searching
//! ```
//!
//! Bytes arrive from the UART in arbitrary chunks.  The assembler collects
//! them into a fixed buffer and yields one complete line per line-feed.
//! A `'$'` always starts a fresh sentence, even mid-line, and a line that
//! outgrows the buffer is thrown away rather than parsed.

use heapless::Vec;

use crate::error::SentenceError;

/// Assembly buffer size.  NMEA caps a sentence at 82 bytes including CR LF;
/// the slack tolerates chatty receivers.
pub const LINE_CAPACITY: usize = 128;

/// Knots → statute miles per hour.
pub const KNOTS_TO_MPH: f32 = 1.1508;

/// Fastest speed over ground accepted as a real fix (~288 mph).
pub const MAX_SPEED_KNOTS: f32 = 250.0;

/// Field index of the status flag.
const STATUS_FIELD: usize = 2;
/// Field index of speed over ground.
const SPEED_FIELD: usize = 7;

/// One parsed sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub fix_valid: bool,
    /// Speed over ground in mph, already floored.  Always 0 while searching.
    pub speed_mph: f32,
}

impl GpsFix {
    pub const SEARCHING: Self = Self {
        fix_valid: false,
        speed_mph: 0.0,
    };
}

// ---------------------------------------------------------------------------
// Line assembler
// ---------------------------------------------------------------------------

/// Streaming line assembler.
pub struct SentenceAssembler {
    buf: Vec<u8, LINE_CAPACITY>,
    /// Set after an overrun; bytes are dropped until the next `'$'` or LF.
    discarding: bool,
    /// A line was handed out on the previous push and must be cleared.
    complete: bool,
}

impl SentenceAssembler {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            discarding: false,
            complete: false,
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(Ok(line))` when a line-feed completes a non-empty line
    /// (CR and LF stripped).  The slice is valid until the next `push`.
    /// Returns `Some(Err(Overrun))` once when a line outgrows the buffer.
    pub fn push(&mut self, byte: u8) -> Option<Result<&[u8], SentenceError>> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }

        match byte {
            b'$' => {
                self.buf.clear();
                self.discarding = false;
                // Capacity is > 0, so the marker always fits.
                let _ = self.buf.push(byte);
                None
            }
            b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    self.buf.clear();
                    return None;
                }
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                if self.buf.is_empty() {
                    return None;
                }
                self.complete = true;
                Some(Ok(&self.buf))
            }
            _ if self.discarding => None,
            _ => {
                if self.buf.push(byte).is_err() {
                    self.buf.clear();
                    self.discarding = true;
                    return Some(Err(SentenceError::Overrun));
                }
                None
            }
        }
    }

    /// Drop any partial line (input source switched away, UART flushed).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
        self.complete = false;
    }

    /// Bytes currently buffered.
    pub fn pending(&self) -> usize {
        if self.complete { 0 } else { self.buf.len() }
    }
}

impl Default for SentenceAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Sentence parsing
// ---------------------------------------------------------------------------

/// XOR of every byte between an optional leading `'$'` and the `'*'`.
pub fn checksum(payload: &[u8]) -> u8 {
    let body = payload.strip_prefix(b"$").unwrap_or(payload);
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Split off and verify a `*hh` suffix, if present.
fn strip_checksum(line: &[u8]) -> Result<&[u8], SentenceError> {
    let Some(star) = line.iter().rposition(|&b| b == b'*') else {
        return Ok(line);
    };
    let (payload, suffix) = (&line[..star], &line[star + 1..]);
    let expected = core::str::from_utf8(suffix)
        .ok()
        .filter(|s| s.len() == 2)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or(SentenceError::BadChecksum)?;
    if checksum(payload) == expected {
        Ok(payload)
    } else {
        Err(SentenceError::BadChecksum)
    }
}

fn field(sentence: &str, index: usize) -> Result<&str, SentenceError> {
    sentence
        .split(',')
        .nth(index)
        .map(str::trim)
        .ok_or(SentenceError::MissingField(index))
}

/// Parse one assembled line.
///
/// Speeds below `min_speed_mph` are reported as 0.  Negative speeds and
/// speeds above [`MAX_SPEED_KNOTS`] are [`SentenceError::BadSpeed`].  A
/// searching receiver yields [`GpsFix::SEARCHING`] whether or not the speed
/// field is present.
pub fn parse_sentence(line: &[u8], min_speed_mph: f32) -> Result<GpsFix, SentenceError> {
    let payload = strip_checksum(line)?;
    let sentence = core::str::from_utf8(payload).map_err(|_| SentenceError::NotUtf8)?;

    if field(sentence, STATUS_FIELD)? != "A" {
        return Ok(GpsFix::SEARCHING);
    }

    let knots: f32 = field(sentence, SPEED_FIELD)?
        .parse()
        .map_err(|_| SentenceError::BadSpeed)?;
    if !(0.0..=MAX_SPEED_KNOTS).contains(&knots) {
        return Err(SentenceError::BadSpeed);
    }
    let mph = KNOTS_TO_MPH * knots;

    Ok(GpsFix {
        fix_valid: true,
        speed_mph: if mph < min_speed_mph { 0.0 } else { mph },
    })
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Assembler + parser pair fed from the GPS UART.
pub struct GpsSpeedSource {
    assembler: SentenceAssembler,
    min_speed_mph: f32,
}

impl GpsSpeedSource {
    pub const fn new(min_speed_mph: f32) -> Self {
        Self {
            assembler: SentenceAssembler::new(),
            min_speed_mph,
        }
    }

    /// Feed one byte; returns the outcome of any sentence it completed.
    pub fn push(&mut self, byte: u8) -> Option<Result<GpsFix, SentenceError>> {
        let min = self.min_speed_mph;
        self.assembler
            .push(byte)
            .map(|line| line.and_then(|l| parse_sentence(l, min)))
    }

    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    pub fn set_min_speed_mph(&mut self, mph: f32) {
        self.min_speed_mph = mph;
    }
}
