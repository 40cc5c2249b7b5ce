//! Filename sanitization for install-name path segments.

/// Turns an arbitrary user-supplied string into a single safe path segment.
///
/// Implementations must be total. An empty result is allowed and means the
/// input had nothing usable in it.
pub trait FilenameSanitizer: Send + Sync {
    fn clean(&self, raw: &str) -> String;
}

/// Default sanitizer for web-facing paths.
///
/// Keeps ASCII letters, digits, `-`, `_` and `.`, lower-cases the result and
/// strips leading dots, so a segment is never hidden and never `.` or `..`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSafeSanitizer;

impl FilenameSanitizer for WebSafeSanitizer {
    fn clean(&self, raw: &str) -> String {
        let kept: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        kept.trim_start_matches('.').to_string()
    }
}

impl<F> FilenameSanitizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn clean(&self, raw: &str) -> String {
        self(raw)
    }
}
