//! The named, pluggable transforms a stage can run, and the registry
//! that resolves a CLI-supplied name to one.
//!
//! Each transform is a pure `fn(&str) -> Option<String>` with no
//! module-level state, so two stages can run the exact same transform
//! and remain completely independent of one another.

use crate::error::{PipelineError, Result};

/// A pure transformation from one owned string to another. `None`
/// signals a malformed transform result; the stage logs it and moves
/// on to the next item rather than treating it as fatal.
pub type TransformFn = fn(&str) -> Option<String>;

pub fn uppercase(input: &str) -> Option<String> {
    Some(input.to_uppercase())
}

/// Reverses character order.
pub fn flipper(input: &str) -> Option<String> {
    Some(input.chars().rev().collect())
}

/// Moves the last character to the front, shifting everything else
/// one place right.
pub fn rotator(input: &str) -> Option<String> {
    let mut chars: Vec<char> = input.chars().collect();
    if chars.len() > 1 {
        let last = chars.pop().unwrap();
        chars.insert(0, last);
    }
    Some(chars.into_iter().collect())
}

/// Inserts one space between every pair of adjacent characters.
pub fn expander(input: &str) -> Option<String> {
    Some(
        input
            .chars()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Prefixes the input with `"[logger] "`.
pub fn logger(input: &str) -> Option<String> {
    Some(format!("[logger] {input}"))
}

/// Prefixes the input with `"[typewriter] "`, exactly like `logger`,
/// but as a side effect also echoes the input to stdout one character
/// at a time with a 100ms delay between characters, regardless of
/// whether the stage is terminal.
pub fn typewriter(input: &str) -> Option<String> {
    use std::io::Write;
    use std::time::Duration;

    print!("[typewriter] ");
    let _ = std::io::stdout().flush();
    for ch in input.chars() {
        print!("{ch}");
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    Some(format!("[typewriter] {input}"))
}

/// Every stage name this build knows how to load.
pub const CATALOGUE: &[(&str, TransformFn)] = &[
    ("logger", logger),
    ("typewriter", typewriter),
    ("uppercaser", uppercase),
    ("rotator", rotator),
    ("flipper", flipper),
    ("expander", expander),
];

/// Resolves a stage name to its transform. Fails with
/// [`PipelineError::Load`] for anything not in [`CATALOGUE`].
pub fn resolve(name: &str) -> Result<TransformFn> {
    CATALOGUE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
        .ok_or_else(|| {
            let known: Vec<&str> = CATALOGUE.iter().map(|(n, _)| *n).collect();
            PipelineError::load(name, format!("unknown stage, expected one of {known:?}"))
        })
}

/// Human-readable catalogue listing, used by `--list-stages` and the
/// help banner.
pub fn describe_catalogue() -> String {
    let mut out = String::from("Available stages:\n");
    out.push_str("  logger      - prefixes each string with \"[logger] \"\n");
    out.push_str("  typewriter  - prefixes with \"[typewriter] \" and echoes with a typing effect\n");
    out.push_str("  uppercaser  - converts the string to uppercase\n");
    out.push_str("  rotator     - moves every character right, wrapping the last to the front\n");
    out.push_str("  flipper     - reverses the order of characters\n");
    out.push_str("  expander    - inserts a single space between each character\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("uppercaser", "aA1", "AA1")]
    #[case("flipper", "abc", "cba")]
    #[case("rotator", "hello", "ohell")]
    #[case("expander", "hi", "h i")]
    #[case("logger", "x", "[logger] x")]
    fn test_transform_matches_expected_output(#[case] name: &str, #[case] input: &str, #[case] expected: &str) {
        let f = resolve(name).unwrap();
        assert_eq!(f(input).as_deref(), Some(expected));
    }

    #[test]
    fn test_rotator_handles_empty_and_single_char() {
        assert_eq!(rotator("").as_deref(), Some(""));
        assert_eq!(rotator("a").as_deref(), Some("a"));
    }

    #[test]
    fn test_expander_handles_empty_and_single_char() {
        assert_eq!(expander("").as_deref(), Some(""));
        assert_eq!(expander("a").as_deref(), Some("a"));
    }

    #[test]
    fn test_unknown_stage_name_is_a_load_error() {
        let err = resolve("no-such-stage").unwrap_err();
        assert!(matches!(err, PipelineError::Load(_, _)));
    }

    #[test]
    fn test_same_transform_can_back_two_independent_stages() {
        // Two `uppercaser` stages must behave identically and
        // independently since the function carries no state of its
        // own.
        let a = resolve("uppercaser").unwrap();
        let b = resolve("uppercaser").unwrap();
        assert_eq!(a("aA"), Some("AA".to_string()));
        assert_eq!(b("aA"), Some("AA".to_string()));
    }

    #[test]
    fn test_catalogue_listing_mentions_every_stage() {
        let listing = describe_catalogue();
        for (name, _) in CATALOGUE {
            assert!(listing.contains(name));
        }
    }
}
