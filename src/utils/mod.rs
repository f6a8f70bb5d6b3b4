//! Shared utility functions for product-forge.

pub mod json_extraction;
pub mod text;

pub use json_extraction::{parse_json_object, JsonExtractionError};
