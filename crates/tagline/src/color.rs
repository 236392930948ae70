//! ANSI colors for log lines.
//!
//! The color tags (`${red}`, `${reset}`, ...) write the raw escape sequences
//! of a [`ColorScheme`]. When colors are enabled, `${status}`, `${method}`
//! and `${error}` are also wrapped in scheme colors.
//!
//! # Example
//!
//! ```rust
//! use tagline::ColorScheme;
//! use http::StatusCode;
//!
//! let scheme = ColorScheme::default();
//! assert_eq!(scheme.status_color(StatusCode::NOT_FOUND), scheme.yellow);
//! ```

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

/// Escape sequences used by the color tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub black: String,
    pub red: String,
    pub green: String,
    pub yellow: String,
    pub blue: String,
    pub magenta: String,
    pub cyan: String,
    pub white: String,
    pub reset: String,
}

impl Default for ColorScheme {
    /// Bright foreground colors (SGR 90-97).
    fn default() -> Self {
        Self {
            black: "\x1b[90m".to_string(),
            red: "\x1b[91m".to_string(),
            green: "\x1b[92m".to_string(),
            yellow: "\x1b[93m".to_string(),
            blue: "\x1b[94m".to_string(),
            magenta: "\x1b[95m".to_string(),
            cyan: "\x1b[96m".to_string(),
            white: "\x1b[97m".to_string(),
            reset: "\x1b[0m".to_string(),
        }
    }
}

impl ColorScheme {
    /// A scheme whose every entry is empty, for sinks that must stay plain.
    pub fn plain() -> Self {
        Self {
            black: String::new(),
            red: String::new(),
            green: String::new(),
            yellow: String::new(),
            blue: String::new(),
            magenta: String::new(),
            cyan: String::new(),
            white: String::new(),
            reset: String::new(),
        }
    }

    /// Looks up a color by tag name.
    pub fn by_name(&self, name: &str) -> Option<&str> {
        let code = match name {
            "black" => self.black.as_str(),
            "red" => self.red.as_str(),
            "green" => self.green.as_str(),
            "yellow" => self.yellow.as_str(),
            "blue" => self.blue.as_str(),
            "magenta" => self.magenta.as_str(),
            "cyan" => self.cyan.as_str(),
            "white" => self.white.as_str(),
            "reset" => self.reset.as_str(),
            _ => return None,
        };
        Some(code)
    }

    /// Color for a response status class.
    pub fn status_color(&self, status: StatusCode) -> &str {
        match status.as_u16() {
            200..=299 => self.green.as_str(),
            300..=399 => self.blue.as_str(),
            400..=499 => self.yellow.as_str(),
            _ => self.red.as_str(),
        }
    }

    /// Color for a request method.
    pub fn method_color(&self, method: &Method) -> &str {
        match *method {
            Method::GET => self.cyan.as_str(),
            Method::POST => self.green.as_str(),
            Method::PUT => self.yellow.as_str(),
            Method::DELETE => self.red.as_str(),
            Method::PATCH => self.white.as_str(),
            Method::HEAD => self.magenta.as_str(),
            Method::OPTIONS => self.blue.as_str(),
            _ => self.reset.as_str(),
        }
    }
}

/// Names of the color tags, in scheme order.
pub const COLOR_TAGS: [&str; 9] = [
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white", "reset",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_color_tag_resolves() {
        let scheme = ColorScheme::default();
        for name in COLOR_TAGS {
            let code = scheme.by_name(name).unwrap();
            assert!(code.starts_with("\x1b["), "{} -> {:?}", name, code);
        }
        assert_eq!(scheme.by_name("purple"), None);
    }

    #[test]
    fn test_status_classes() {
        let scheme = ColorScheme::default();
        assert_eq!(scheme.status_color(StatusCode::OK), scheme.green);
        assert_eq!(scheme.status_color(StatusCode::FOUND), scheme.blue);
        assert_eq!(scheme.status_color(StatusCode::NOT_FOUND), scheme.yellow);
        assert_eq!(
            scheme.status_color(StatusCode::INTERNAL_SERVER_ERROR),
            scheme.red
        );
        assert_eq!(scheme.status_color(StatusCode::CONTINUE), scheme.red);
    }

    #[test]
    fn test_method_colors() {
        let scheme = ColorScheme::default();
        assert_eq!(scheme.method_color(&Method::GET), scheme.cyan);
        assert_eq!(scheme.method_color(&Method::DELETE), scheme.red);
        assert_eq!(scheme.method_color(&Method::TRACE), scheme.reset);
    }

    #[test]
    fn test_plain_scheme_is_empty() {
        let scheme = ColorScheme::plain();
        assert!(COLOR_TAGS.iter().all(|n| scheme.by_name(n) == Some("")));
    }

    #[test]
    fn test_scheme_from_yaml_overrides_some_entries() {
        let scheme: ColorScheme = serde_yaml::from_str("red: \"\\e[31m\"").unwrap();
        assert_eq!(scheme.red, "\x1b[31m");
        assert_eq!(scheme.green, ColorScheme::default().green);
    }
}
