//! Parser for the payload of a single mote frame, the text found between
//! `<START>` and `<END>` on the wire.
//!
//! ```text
//! TAG=SENSOR_DATA, ID=17, Light=645, Seq=3
//! ```
//!
//! The first field names the kind of frame (the sink firmware prints
//! `DEBUG_INFO=SINK_DATA`, the sensor firmware `TAG=SENSOR_DATA`), so its
//! key is accepted as any word. `Seq` is optional.

use nom::{
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{char, multispace0, u32},
    combinator::{map, opt},
    error::Error,
    sequence::{delimited, preceded, terminated, tuple},
    Finish, IResult,
};

use std::str::FromStr;

use crate::sensor_registry::{Reading, SensorId};

/// One decoded frame, as reported by a mote or the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoteFrame {
    /// The origin tag, e.g. `SENSOR_DATA` or `SINK_DATA`
    pub tag: String,
    /// Id of the mote that sampled the light value
    pub sensor_id: SensorId,
    /// Raw light sensor value
    pub light: u32,
    /// Sequence number, if the sender included one
    pub seq: Option<u32>,
}

impl From<MoteFrame> for Reading {
    fn from(frame: MoteFrame) -> Self {
        Reading {
            sensor_id: frame.sensor_id,
            intensity: frame.light as f64,
            seq: frame.seq,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `<spaces>KEY<spaces>=<spaces>`
fn key<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    delimited(
        multispace0,
        tag(name),
        tuple((multispace0, char('='), multispace0)),
    )
}

fn parse_tag(s: &str) -> IResult<&str, String> {
    preceded(
        tuple((
            multispace0,
            take_while1(is_word_char),
            multispace0,
            char('='),
            multispace0,
        )),
        map(take_till1(|c: char| c == ','), |v: &str| v.trim().to_owned()),
    )(s)
}

fn parse_field<'a>(name: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    preceded(tuple((multispace0, char(','), key(name))), u32)
}

fn parse_mote_frame(s: &str) -> IResult<&str, MoteFrame> {
    map(
        terminated(
            tuple((
                parse_tag,
                parse_field("ID"),
                parse_field("Light"),
                opt(parse_field("Seq")),
            )),
            multispace0,
        ),
        |(tag, sensor_id, light, seq)| MoteFrame {
            tag,
            sensor_id,
            light,
            seq,
        },
    )(s)
}

impl FromStr for MoteFrame {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_mote_frame(s).finish() {
            Ok((_remaining, frame)) => Ok(frame),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}
