//! Document path rendering for error messages.
//!
//! Paths read like `$.Orders[2].Customer`. Property names containing
//! characters that would be ambiguous in dot notation are bracket-quoted:
//! `$['odd.name']`.

use std::fmt::Write as _;

/// Append a property segment to a rendered path.
pub fn append_property(path: &mut String, name: &str) {
    if name.chars().any(needs_quoting) {
        path.push_str("['");
        path.push_str(name);
        path.push_str("']");
    } else {
        path.push('.');
        path.push_str(name);
    }
}

/// Append an array index segment to a rendered path.
pub fn append_index(path: &mut String, index: usize) {
    // Writing into a String cannot fail.
    let _ = write!(path, "[{index}]");
}

fn needs_quoting(c: char) -> bool {
    matches!(
        c,
        '.' | ' '
            | '\''
            | '/'
            | '"'
            | '['
            | ']'
            | '('
            | ')'
            | '\t'
            | '\n'
            | '\r'
            | '\u{c}'
            | '\u{8}'
            | '\\'
            | '\u{2028}'
            | '\u{2029}'
    )
}
