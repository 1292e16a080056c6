//! Registry of image types accepted for upload.
//!
//! The table is fixed at compile time. Lookups are case-insensitive and the
//! filename pattern is derived from the same table, so anything that passes
//! [`is_valid_extension_file`] also resolves through [`find_by_extension`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// A supported file type: extension plus the content type stored with it.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageType {
    /// Lowercase extension without the leading dot.
    pub extension: &'static str,

    /// MIME type written to the object's `Content-Type`.
    pub content_type: &'static str,
}

/// Supported types, in the order they are reported to clients.
pub const SUPPORTED_IMAGE_TYPES: [ImageType; 3] = [
    ImageType {
        extension: "png",
        content_type: "image/png",
    },
    ImageType {
        extension: "jpeg",
        content_type: "image/jpeg",
    },
    ImageType {
        extension: "jpg",
        content_type: "image/jpeg",
    },
];

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternatives = SUPPORTED_IMAGE_TYPES
        .iter()
        .map(|t| regex::escape(t.extension))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^.*\.({})$", alternatives))
        .expect("extension pattern built from static table")
});

/// Ordered list of registered extensions.
pub fn supported_extensions() -> Vec<&'static str> {
    SUPPORTED_IMAGE_TYPES.iter().map(|t| t.extension).collect()
}

/// Registered extensions joined with `delimiter`, e.g. `png,jpeg,jpg`.
pub fn extensions_to_delimited_string(delimiter: &str) -> String {
    supported_extensions().join(delimiter)
}

/// True when `file_name` ends in `.{ext}` for a registered extension.
///
/// Blank names are never valid.
pub fn is_valid_extension_file(file_name: &str) -> bool {
    if file_name.trim().is_empty() {
        return false;
    }
    FILENAME_PATTERN.is_match(file_name)
}

/// Case-insensitive lookup by extension (without the dot).
pub fn find_by_extension(extension: &str) -> Option<&'static ImageType> {
    if extension.is_empty() {
        return None;
    }
    SUPPORTED_IMAGE_TYPES
        .iter()
        .find(|t| t.extension.eq_ignore_ascii_case(extension))
}

/// Content type registered for `extension`, if any.
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    find_by_extension(extension).map(|t| t.content_type)
}
