//! Data types for the upload gateway.
//!
//! `image_type` is the read-only registry of accepted file types; `upload`
//! holds the values that live for the duration of a single request.

pub mod image_type;
pub mod upload;
