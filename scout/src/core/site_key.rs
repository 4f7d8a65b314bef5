//! Storage key derivation for site URLs.

/// Map a site URL to a filesystem-safe key.
///
/// One trailing `/` is ignored; every character outside `[A-Za-z0-9_-]` becomes `_`.
/// Applying the function to its own output returns the output unchanged.
pub fn site_key(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
