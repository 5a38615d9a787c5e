//! Content classification for the rewrite dispatch.
//!
//! The rewrite pipeline branches on a closed enumeration rather than on
//! raw mime strings, so the dispatch is exhaustive and compiler-checked.
//! `mime_guess` is used only where an actual content-type header value is
//! needed; the enum itself is keyed on the file extension.

use std::path::Path;

/// Recognized content classifications.
///
/// `Other` passes through the rewrite pipeline unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Html,
    Javascript,
    Css,
    Other,
}

impl ContentClass {
    /// Classify by file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("html") | Some("htm") => Self::Html,
            Some("js") | Some("mjs") => Self::Javascript,
            Some("css") => Self::Css,
            _ => Self::Other,
        }
    }

    /// Canonical content-type header value for recognized classes.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Html => Some("text/html"),
            Self::Javascript => Some("text/javascript"),
            Self::Css => Some("text/css"),
            Self::Other => None,
        }
    }

    /// Classify by a declared content type (as stored in an asset descriptor).
    pub fn from_content_type(content_type: &str) -> Self {
        // Parameters like "; charset=utf-8" do not affect the class.
        match content_type.split(';').next().unwrap_or("").trim() {
            "text/html" => Self::Html,
            "text/javascript" | "application/javascript" => Self::Javascript,
            "text/css" => Self::Css,
            _ => Self::Other,
        }
    }
}

/// Guess the content-type header value for a file path.
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(ContentClass::from_path(Path::new("a/index.html")), ContentClass::Html);
        assert_eq!(ContentClass::from_path(Path::new("app.JS")), ContentClass::Javascript);
        assert_eq!(ContentClass::from_path(Path::new("style.css")), ContentClass::Css);
        assert_eq!(ContentClass::from_path(Path::new("game.unityweb")), ContentClass::Other);
        assert_eq!(ContentClass::from_path(Path::new("noext")), ContentClass::Other);
    }

    #[test]
    fn classifies_by_content_type() {
        assert_eq!(ContentClass::from_content_type("text/html"), ContentClass::Html);
        assert_eq!(
            ContentClass::from_content_type("text/html; charset=utf-8"),
            ContentClass::Html
        );
        assert_eq!(
            ContentClass::from_content_type("application/javascript"),
            ContentClass::Javascript
        );
        assert_eq!(ContentClass::from_content_type("image/png"), ContentClass::Other);
    }

    #[test]
    fn guesses_header_values() {
        assert_eq!(guess_content_type(Path::new("a.css")), "text/css");
        assert_eq!(
            guess_content_type(Path::new("blob.bin")),
            "application/octet-stream"
        );
    }
}
