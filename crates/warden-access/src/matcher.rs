//! Wildcard segment permission matching.

/// Checks whether a held permission satisfies a required permission.
///
/// A held permission `P` satisfies required permission `R` iff:
/// - `P` is the bare wildcard `*`, or
/// - `P == R`, or
/// - `P` and `R` have the same number of dot segments and every segment
///   of `P` is either `*` or equal to the corresponding segment of `R`.
///
/// The bare `*` is the only pattern exempt from the equal-segment-count
/// rule: `inspection.*` does not match `inspection.photo.read`.
#[must_use]
pub fn permission_matches(held: &str, required: &str) -> bool {
    if held == "*" || held == required {
        return true;
    }

    let held_segments: Vec<&str> = held.split('.').collect();
    let required_segments: Vec<&str> = required.split('.').collect();

    if held_segments.len() != required_segments.len() {
        return false;
    }

    held_segments
        .iter()
        .zip(required_segments.iter())
        .all(|(h, r)| *h == "*" || h == r)
}
