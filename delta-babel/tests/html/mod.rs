//! HTML format tests
//!
//! Document ↔ HTML conversion through the public format surface.

mod round_trip;
mod table;
