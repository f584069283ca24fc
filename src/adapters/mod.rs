//! Transport adapters behind the controller session seam.

pub mod driver;
