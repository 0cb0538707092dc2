pub mod blend;
pub mod config;
pub mod interpolate;
pub mod simulate;
