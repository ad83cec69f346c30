//! Helpers for composing human-readable strings from optional parts.

/// Append `suffix` to `head` with a comma separator, skipping empty parts.
pub fn append_if_not_empty(head: &str, suffix: &str) -> String {
    if !head.trim().is_empty() {
        if !suffix.trim().is_empty() {
            return format!("{head}, {suffix}");
        }
        return head.to_string();
    }
    suffix.to_string()
}

/// Join two address parts into a single readable string.
///
/// Falls back to the literal `"NA"` sentinel when both parts are empty, so
/// layouts never render a blank field.
pub fn join_readable(a: &str, b: &str) -> String {
    let mut joined = String::new();
    joined = append_if_not_empty(&joined, a);
    joined = append_if_not_empty(&joined, b);
    if joined.is_empty() {
        return "NA".to_string();
    }
    joined
}
