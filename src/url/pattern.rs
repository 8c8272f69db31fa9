use crate::ConfigError;
use regex::Regex;

/// Characters accepted as pattern delimiters (`@...@i`, `/.../`, `#...#`)
const DELIMITERS: &[char] = &['/', '@', '#', '~', '!', '%', ',', ';', '`'];

/// Compiles a link pattern into a regex
///
/// Patterns may be bare (`\.pdf$`) or delimited with trailing flags
/// (`@\.pdf$@i`). Delimiters are stripped and the flags `i`, `m`, `s`, `x`
/// and `U` become inline regex flags; `u` is accepted and ignored since
/// matching is always unicode-aware.
///
/// # Examples
///
/// ```
/// use tidemark::url::compile_pattern;
///
/// let re = compile_pattern(r"@/private/.*@i").unwrap();
/// assert!(re.is_match("https://example.com/PRIVATE/page"));
/// ```
pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.trim().is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Link pattern cannot be empty".to_string(),
        ));
    }

    let source = match split_delimited(pattern) {
        Some((body, flags)) if !flags.is_empty() => format!("(?{}){}", flags, body),
        Some((body, _)) => body.to_string(),
        None => pattern.to_string(),
    };

    Regex::new(&source)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Splits `<d>body<d>flags` into body and regex-crate flags
fn split_delimited(pattern: &str) -> Option<(&str, String)> {
    let delimiter = pattern.chars().next()?;
    if !DELIMITERS.contains(&delimiter) {
        return None;
    }

    let end = pattern.rfind(delimiter)?;
    if end == 0 {
        return None;
    }

    let flags = &pattern[end + delimiter.len_utf8()..];
    if !flags
        .chars()
        .all(|c| matches!(c, 'i' | 'm' | 's' | 'x' | 'u' | 'U'))
    {
        return None;
    }

    let body = &pattern[delimiter.len_utf8()..end];
    Some((body, flags.chars().filter(|c| *c != 'u').collect()))
}
