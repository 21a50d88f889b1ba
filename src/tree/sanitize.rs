/// Turns a display name into something usable as a single path segment.
///
/// - path separators and whitespace runs become a single `_`
/// - everything but alphanumerics, `-`, `_` and `.` is dropped
/// - consecutive underscores are collapsed, leading/trailing ones trimmed
///
/// The result is stable: sanitizing twice gives the same string.
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            pending_separator = true;
            continue;
        }
        if pending_separator {
            cleaned.push('_');
            pending_separator = false;
        }
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
            cleaned.push(c);
        }
    }

    let mut collapsed = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    collapsed.trim_matches('_').to_string()
}
