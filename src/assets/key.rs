//! Storage key derivation for uploaded images
//!
//! Keys follow the persisted `images/<unix-millis>-<sanitized-filename>`
//! contract, so existing records keep resolving.

/// Replace every character outside `[A-Za-z0-9._-]` with an underscore
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derive the object key for an upload
///
/// Uniqueness relies on millisecond granularity plus the filename: two
/// uploads of the same name within the same millisecond collide. Known
/// race, kept because the key format is a persisted contract.
pub fn object_key(timestamp_millis: i64, sanitized_filename: &str) -> String {
    format!("images/{}-{}", timestamp_millis, sanitized_filename)
}
