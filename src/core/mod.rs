//! Pure data model: register schema, value codec, DTOs. No I/O.

pub mod codec;
pub mod model;
pub mod schema;
