//! # Nested Quoting
//!
//! Folds an ordered list of command stages (outermost first) into a single argv such that
//! every `sh -c` layer between the caller and the innermost stage peels exactly one level
//! of quoting and the innermost payload arrives unchanged.
//!
//! Each inner stage is fused with everything nested below it and wrapped in double quotes.
//! Wrapping escapes `\`, `"`, `$` and `` ` `` in the wrapped text, so a delimiter that sits
//! at nesting depth `d` ends up preceded by exactly `2^d - 1` backslashes (0, 1, 3, 7, ...).

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    // Words made only of these characters survive a shell pass without quoting.
    static ref PLAIN_WORD_RE: Regex = Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").unwrap();
}

const DELIMITER: char = '"';

/// Wraps a token in single quotes so that one shell pass yields it back verbatim.
pub fn single_quote(token: &str) -> String {
    format!("'{}'", token.replace('\'', r"'\''"))
}

/// Quotes a token for one shell pass only when it needs it.
pub fn shell_word(token: &str) -> Cow<'_, str> {
    if PLAIN_WORD_RE.is_match(token) {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(single_quote(token))
    }
}

/// Joins tokens into one shell-parsable line, quoting only where needed.
pub fn join_words<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| shell_word(token.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Folds `stages` into an argv.
///
/// The outermost stage is split into discrete tokens (a real argv). Every inner stage stays
/// fused into a single string argument of its parent. With `escape_root` the fused argument
/// gets one more layer of quoting, for callers that hand the whole line to one more shell.
pub fn nested_quote<S: AsRef<str>>(stages: &[S], escape_root: bool) -> Vec<String> {
    let Some((root, inner)) = stages.split_first() else {
        return Vec::new();
    };
    let root = root.as_ref();
    let mut argv = shlex::split(root).unwrap_or_else(|| vec![root.to_string()]);

    if let Some(tail) = fold_inner(inner) {
        argv.push(if escape_root { wrap(&tail, 0) } else { tail });
    }
    argv
}

/// The single-line form of [`nested_quote`] with `escape_root`, ready to paste into a shell.
pub fn command_line<S: AsRef<str>>(stages: &[S]) -> String {
    let Some((root, inner)) = stages.split_first() else {
        return String::new();
    };
    match fold_inner(inner) {
        Some(tail) => format!("{} {}", root.as_ref(), wrap(&tail, 0)),
        None => root.as_ref().to_string(),
    }
}

/// Folds inner stages innermost first. The accumulator wrapped while joining stage `i`
/// (0-based among the inner stages) lands at nesting depth `i`.
fn fold_inner<S: AsRef<str>>(stages: &[S]) -> Option<String> {
    stages
        .iter()
        .enumerate()
        .rev()
        .fold(None, |accumulator, (depth, stage)| {
            let stage = stage.as_ref();
            Some(match accumulator {
                None => stage.to_string(),
                Some(inner) => format!("{} {}", stage, wrap(&inner, depth)),
            })
        })
}

fn wrap(text: &str, depth: usize) -> String {
    log::trace!("Wrapping stage at nesting depth {}: {}", depth, text);
    let mut wrapped = String::with_capacity(text.len() + 8);
    wrapped.push(DELIMITER);
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            wrapped.push('\\');
        }
        wrapped.push(c);
    }
    wrapped.push(DELIMITER);
    wrapped
}
