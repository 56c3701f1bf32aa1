//! Re-raise placeholder detection in format templates.
//!
//! `FormatError("load %s: %w", name, err)` re-raises `err`: the resulting
//! error still answers identity tests for it. Any other verb (`%v`, `%s`)
//! only copies the message and loses the identity.

use smallvec::SmallVec;

/// The verb that re-raises its argument.
const RERAISE_VERB: char = 'w';

/// Argument indices (relative to the first argument after the template)
/// bound to a re-raise placeholder.
///
/// `%%` is a literal percent sign and binds nothing. Flags, width and
/// precision between `%` and the verb are skipped.
pub fn reraised_args(template: &str) -> SmallVec<[usize; 1]> {
    let mut found = SmallVec::new();
    let mut arg = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            continue;
        }
        while chars
            .peek()
            .is_some_and(|&c| matches!(c, '+' | '-' | '#' | ' ' | '.') || c.is_ascii_digit())
        {
            chars.next();
        }
        let Some(verb) = chars.next() else {
            break;
        };
        if verb == RERAISE_VERB {
            found.push(arg);
        }
        arg += 1;
    }

    found
}
