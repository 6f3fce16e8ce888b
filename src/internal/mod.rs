//! Internal modules ported from external libraries.
//!
//! These modules contain code adapted from:
//! - pycocotools: box IoU with crowd handling

pub mod cocoeval;
