//! Recovery of a JSON object embedded in surrounding prose.
//!
//! Models occasionally wrap the object in commentary or markdown fences.
//! This step only slices; it never validates. Whether the slice parses is
//! decided by [`crate::normalize::parse_reply`].

/// Carve the candidate object out of `raw`.
///
/// The input is trimmed. If it already starts with `{` it is returned as is.
/// Otherwise the slice from the first `{` to the last `}` (inclusive) is
/// returned when both exist in that order; failing that, the trimmed input.
pub fn carve_object(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(first), Some(last)) if last > first => &trimmed[first..=last],
        _ => trimmed,
    }
}
