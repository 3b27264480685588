//! motelocate takes the light readings of a handful of fixed sensor motes
//! and works out where the light source most likely is.
//!
//! Readings come either from the sink mote over a serial line, framed as
//! `<START>TAG=SENSOR_DATA, ID=3, Light=500<END>` and decoded by
//! [`frame_decoder`], or from a recorded dataset through [`replay`] when no
//! hardware is attached. They are collected in a [`sensor_registry`], and
//! once per tick the [`tracker`] hands the active sensors to the
//! [`estimator`], which fits a source position by nonlinear least squares.
//!
//! Everything runs on one thread, driven by the fixed-rate loop in the
//! `motelocate` binary.

#![warn(missing_docs)]
pub mod args;
pub mod config;
pub mod estimator;
pub mod frame_decoder;
pub mod gui;
pub mod mote_message_decoder;
pub mod nelder_mead;
pub mod pacer;
pub mod reading_source;
pub mod replay;
pub mod sensor_registry;
pub mod tracker;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A position on the map, in pixels.
#[derive(Debug, PartialEq, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate, growing downwards
    pub y: f64,
}

impl Point {
    /// Euclidean distance to `other`
    pub fn abs_dist(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// A source estimate, snapped to the nearest pixel.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PixelPoint {
    /// Horizontal pixel
    pub x: i32,
    /// Vertical pixel
    pub y: i32,
}

impl From<Point> for PixelPoint {
    fn from(p: Point) -> Self {
        PixelPoint {
            x: p.x.round() as i32,
            y: p.y.round() as i32,
        }
    }
}

impl Display for PixelPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
