//! Shell quoting shared by the `pg_worker` binary and the test cluster
//! wrapper scripts.

/// Quotes `value` for a POSIX shell word.
///
/// The value is wrapped in single quotes; embedded quotes become `'\''`.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len().saturating_add(2));
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}
