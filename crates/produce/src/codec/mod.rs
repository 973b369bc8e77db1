//! Patch codecs.

pub mod json;

pub use json::{from_json, from_json_patch, to_json, to_json_patch};
