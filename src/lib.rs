pub mod config;
pub mod decoding;
pub mod error_codes;
pub mod geometry;
pub mod harness;
pub mod pixel_format;
pub mod render_target;
pub mod strategy;
pub mod surface;
pub mod timing;
