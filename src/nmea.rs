//! Reads position and heading from a GPS receiver speaking NMEA 0183.
//!
//! Only the three sentences the wayfinding loop cares about are decoded:
//! `RMC` (fix and course over ground), `GGA` (fix quality and position)
//! and `HDT` (true heading from a compass or dual-antenna receiver). The
//! talker ID (`GP`, `GN`, `HE`, ...) is accepted and ignored.

use crate::geodesy::{Degrees, LatLon};
use crate::position::SharedPosition;
use crate::session::StopFlag;

use log::{debug, warn};
use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_till, take_till1, take_while_m_n},
    character::complete::{char, one_of, u8 as dec_u8},
    combinator::{map, map_res, opt, rest, value},
    number::complete::double,
    sequence::{preceded, tuple},
    Finish, IResult,
};
use std::{borrow::Cow, fmt, io::Read, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NmeaSentence {
    /// Recommended minimum data. `valid` is the `A`/`V` status flag.
    Rmc {
        valid: bool,
        position: Option<LatLon>,
        course: Option<Degrees>,
    },
    /// Fix data. A `quality` of zero means no fix.
    Gga {
        quality: u8,
        position: Option<LatLon>,
    },
    /// True heading.
    Hdt { heading: Option<Degrees> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NmeaError {
    /// The line is not a well-formed `$...*hh` sentence.
    Malformed(String),
    Checksum { expected: u8, computed: u8 },
    /// Well formed, but not a sentence we decode.
    Unsupported(String),
}

impl fmt::Display for NmeaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            NmeaError::Malformed(s) => Cow::from(format!("malformed sentence: {s}")),
            NmeaError::Checksum { expected, computed } => Cow::from(format!(
                "checksum mismatch: expected {expected:02X}, computed {computed:02X}"
            )),
            NmeaError::Unsupported(s) => Cow::from(format!("unsupported sentence: {s}")),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for NmeaError {}

fn hex_u8(s: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |h: &str| u8::from_str_radix(h, 16),
    )(s)
}

/// `$<body>*<checksum>`
fn frame(s: &str) -> IResult<&str, (&str, u8)> {
    map(
        tuple((char('$'), take_till1(|c| c == '*'), char('*'), hex_u8)),
        |(_, body, _, checksum)| (body, checksum),
    )(s)
}

fn field(s: &str) -> IResult<&str, &str> {
    take_till(|c| c == ',')(s)
}

/// `ddmm.mmmm` or `dddmm.mmmm` to decimal degrees.
fn degrees_minutes(s: &str) -> IResult<&str, f64> {
    map(double, |v| {
        let degrees = (v / 100.0).trunc();
        degrees + (v - degrees * 100.0) / 60.0
    })(s)
}

/// The four `lat,N/S,lon,E/W` fields; all empty when there is no fix.
fn position_fields(s: &str) -> IResult<&str, Option<LatLon>> {
    alt((
        map(
            tuple((
                degrees_minutes,
                preceded(char(','), one_of("NS")),
                preceded(char(','), degrees_minutes),
                preceded(char(','), one_of("EW")),
            )),
            |(lat, ns, lon, ew)| {
                let lat = if ns == 'S' { -lat } else { lat };
                let lon = if ew == 'W' { -lon } else { lon };
                Some(LatLon::new(lat, lon))
            },
        ),
        value(None, tag(",,,")),
    ))(s)
}

fn rmc(s: &str) -> IResult<&str, NmeaSentence> {
    map(
        tuple((
            tag("RMC,"),
            field,
            preceded(char(','), one_of("AV")),
            preceded(char(','), position_fields),
            preceded(char(','), opt(double)),
            preceded(char(','), opt(double)),
            rest,
        )),
        |(_, _time, status, position, _speed, course, _)| NmeaSentence::Rmc {
            valid: status == 'A',
            position,
            course,
        },
    )(s)
}

fn gga(s: &str) -> IResult<&str, NmeaSentence> {
    map(
        tuple((
            tag("GGA,"),
            field,
            preceded(char(','), position_fields),
            preceded(char(','), dec_u8),
            rest,
        )),
        |(_, _time, position, quality, _)| NmeaSentence::Gga { quality, position },
    )(s)
}

fn hdt(s: &str) -> IResult<&str, NmeaSentence> {
    map(
        tuple((tag("HDT,"), opt(double), rest)),
        |(_, heading, _)| NmeaSentence::Hdt { heading },
    )(s)
}

fn body(s: &str) -> IResult<&str, NmeaSentence> {
    preceded(take(2usize), alt((rmc, gga, hdt)))(s)
}

fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

impl FromStr for NmeaSentence {
    type Err = NmeaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (body_str, expected) = match frame(line).finish() {
            Ok((_, parts)) => parts,
            Err(_) => return Err(NmeaError::Malformed(line.to_owned())),
        };

        let computed = checksum(body_str);
        if computed != expected {
            return Err(NmeaError::Checksum { expected, computed });
        }

        match body(body_str).finish() {
            Ok((_, sentence)) => Ok(sentence),
            Err(_) => Err(NmeaError::Unsupported(body_str.to_owned())),
        }
    }
}

impl NmeaSentence {
    /// Pushes what this sentence knows into `shared`. Sentences reporting
    /// no fix clear the stored position.
    pub fn apply(&self, shared: &SharedPosition) {
        match *self {
            NmeaSentence::Rmc {
                valid,
                position,
                course,
            } => {
                match (valid, position) {
                    (true, Some(p)) => shared.set_position(p),
                    _ => shared.clear_position(),
                }
                if let (true, Some(c)) = (valid, course) {
                    shared.set_heading(c);
                }
            }
            NmeaSentence::Gga { quality, position } => match (quality, position) {
                (q, Some(p)) if q > 0 => shared.set_position(p),
                _ => shared.clear_position(),
            },
            NmeaSentence::Hdt { heading } => {
                if let Some(h) = heading {
                    shared.set_heading(h);
                }
            }
        }
    }
}

/// Reads newline-terminated sentences from `reader` until end of input or
/// until `stop` is raised, feeding every good one into `shared`. Read
/// timeouts are expected on serial ports and only give `stop` a chance to
/// be checked.
pub fn read_sentences<R: Read>(mut reader: R, shared: &SharedPosition, stop: &StopFlag) {
    let mut buffer = [0; 256];
    let mut line = Vec::new();

    while !stop.is_raised() {
        let read_len = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => {
                warn!("GPS receiver read failed: {}", e);
                break;
            }
        };

        for &c in buffer.iter().take(read_len) {
            if c != b'\n' {
                line.push(c);
                continue;
            }
            match std::str::from_utf8(&line) {
                Ok(s) if s.trim().is_empty() => {}
                Ok(s) => match NmeaSentence::from_str(s) {
                    Ok(sentence) => {
                        debug!("Received {:?}", sentence);
                        sentence.apply(shared);
                    }
                    Err(NmeaError::Unsupported(_)) => {}
                    Err(e) => warn!("Was unable to parse GPS sentence: {}", e),
                },
                // usually garbage left in the receiver buffer at start-up
                Err(e) => warn!("Failed to decode utf-8: {:?}", e),
            }
            line.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionSource;
    use std::io::Cursor;

    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const HDT: &str = "$HEHDT,274.07,T*19";
    const RMC_NO_FIX: &str = "$GPRMC,235947,V,,,,,,,,,,N*5D";
    const GGA_NO_FIX: &str = "$GPGGA,123519,,,,,0,00,,,M,,M,,*6B";
    const CAMPUS_RMC: &str = "$GNRMC,081836,A,1337.302,N,12311.688,E,0.5,,180926,,,A*44";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn parses_rmc() {
        match RMC.parse::<NmeaSentence>().unwrap() {
            NmeaSentence::Rmc {
                valid,
                position: Some(p),
                course,
            } => {
                assert!(valid);
                assert!(close(p.lat, 48.0 + 7.038 / 60.0));
                assert!(close(p.lon, 11.0 + 31.0 / 60.0));
                assert_eq!(course, Some(84.4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_gga_and_hdt() {
        assert!(matches!(
            GGA.parse::<NmeaSentence>().unwrap(),
            NmeaSentence::Gga {
                quality: 1,
                position: Some(_)
            }
        ));
        assert_eq!(
            HDT.parse::<NmeaSentence>().unwrap(),
            NmeaSentence::Hdt {
                heading: Some(274.07)
            }
        );
    }

    #[test]
    fn parses_sentences_without_fix() {
        assert_eq!(
            RMC_NO_FIX.parse::<NmeaSentence>().unwrap(),
            NmeaSentence::Rmc {
                valid: false,
                position: None,
                course: None
            }
        );
        assert_eq!(
            GGA_NO_FIX.parse::<NmeaSentence>().unwrap(),
            NmeaSentence::Gga {
                quality: 0,
                position: None
            }
        );
    }

    #[test]
    fn rejects_bad_checksum_and_garbage() {
        let bad = RMC.replace("*6A", "*6B");
        assert!(matches!(
            bad.parse::<NmeaSentence>(),
            Err(NmeaError::Checksum {
                expected: 0x6B,
                computed: 0x6A
            })
        ));
        assert!(matches!(
            "hello".parse::<NmeaSentence>(),
            Err(NmeaError::Malformed(_))
        ));
        assert!(matches!(
            "$GPGSV,1*48".parse::<NmeaSentence>(),
            Err(NmeaError::Checksum { .. }) | Err(NmeaError::Unsupported(_))
        ));
    }

    #[test]
    fn southern_and_western_hemispheres_are_negative() {
        let (_, p) = position_fields("3351.600,S,15112.000,W").unwrap();
        let p = p.unwrap();
        assert!(close(p.lat, -33.86));
        assert!(close(p.lon, -151.2));
    }

    #[test]
    fn stream_updates_shared_position() {
        let stream = format!("garbage\r\n{CAMPUS_RMC}\r\n{HDT}\r\n");
        let shared = SharedPosition::new();
        read_sentences(Cursor::new(stream), &shared, &StopFlag::new());

        let p = shared.current_position().unwrap();
        assert!(close(p.lat, 13.0 + 37.302 / 60.0));
        assert!(close(p.lon, 123.0 + 11.688 / 60.0));
        assert!(close(shared.current_heading(), 274.07));
    }

    #[test]
    fn lost_fix_clears_position() {
        let shared = SharedPosition::new();
        GGA.parse::<NmeaSentence>().unwrap().apply(&shared);
        assert!(shared.current_position().is_some());
        RMC_NO_FIX.parse::<NmeaSentence>().unwrap().apply(&shared);
        assert!(shared.current_position().is_none());
    }

    #[test]
    fn raised_stop_reads_nothing() {
        let shared = SharedPosition::new();
        let stop = StopFlag::new();
        stop.raise();
        read_sentences(Cursor::new(format!("{GGA}\n")), &shared, &stop);
        assert!(shared.current_position().is_none());
    }
}
