//! Markdown format tests
//!
//! Document ↔ Markdown conversion through the public format surface.

mod round_trip;
mod table;
