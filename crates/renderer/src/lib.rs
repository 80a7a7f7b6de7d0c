//! Image encoding for WMS responses.
//!
//! sci-wms datasets without a renderable kind still answer GetMap with a
//! correctly sized transparent image; this crate produces it.

pub mod png;

pub use png::{blank_canvas, create_png, create_png_indexed};
