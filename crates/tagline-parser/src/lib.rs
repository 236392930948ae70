//! Parser for `${tag}` style log format strings.
//!
//! This crate turns a format string such as
//! `"${status} - ${method} ${path}\n"` into an ordered list of
//! [`Segment`]s: literal runs of text and references to named tags. It knows
//! nothing about HTTP or about what a tag renders to; binding tag names to
//! renderers is the job of the `tagline` crate.
//!
//! # Example
//!
//! ```rust
//! use tagline_parser::{parse, Segment, TagRef};
//!
//! let segments = parse("${status} ${reqHeader:X-Id}\n").unwrap();
//! assert_eq!(
//!     segments,
//!     vec![
//!         Segment::Tag(TagRef::new("status")),
//!         Segment::Literal(" ".to_string()),
//!         Segment::Tag(TagRef::with_param("reqHeader", "X-Id")),
//!         Segment::Literal("\n".to_string()),
//!     ]
//! );
//! ```
//!
//! # Syntax
//!
//! - `${name}` references the tag `name`.
//! - `${prefix:param}` references the tag `prefix` with the fixed parameter
//!   `param`. Only the first colon splits; `${locals:a:b}` has parameter `a:b`.
//! - Everything outside `${...}` is literal and is kept byte for byte.
//! - A `${` with no closing `}` is literal text.
//! - `${}` is rejected with [`ParseError::EmptyTag`].
//!
//! Tag names are not validated here. An unknown name is still a tag
//! reference; the renderer decides what it produces.

use std::fmt;

/// Opening delimiter of a tag reference.
pub const TAG_START: &str = "${";

/// Closing delimiter of a tag reference.
pub const TAG_END: char = '}';

/// Separator between a tag prefix and its parameter.
pub const PARAM_SEPARATOR: char = ':';

/// Errors produced while parsing a format string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// `${}` with nothing between the delimiters.
    #[error("empty tag at byte offset {offset}")]
    EmptyTag {
        /// Byte offset of the `${` that opened the empty tag.
        offset: usize,
    },
}

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A reference to a tag, as written in the format string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagRef {
    name: String,
    param: Option<String>,
}

impl TagRef {
    /// Creates a reference to a tag without parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: None,
        }
    }

    /// Creates a reference to a parameterized tag.
    pub fn with_param(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: Some(param.into()),
        }
    }

    /// The tag name (the prefix, for parameterized tags).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter following the colon, if any.
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "${{{}{}{}}}", self.name, PARAM_SEPARATOR, param),
            None => write!(f, "${{{}}}", self.name),
        }
    }
}

/// One parsed unit of a format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text emitted verbatim.
    Literal(String),
    /// A tag resolved at render time.
    Tag(TagRef),
}

impl Segment {
    /// Returns the tag reference if this is a tag segment.
    pub fn as_tag(&self) -> Option<&TagRef> {
        match self {
            Segment::Tag(tag) => Some(tag),
            Segment::Literal(_) => None,
        }
    }

    /// Returns true if this is a literal segment.
    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

/// Parses a format string into segments.
///
/// Adjacent literal runs are merged, so the result never contains two
/// consecutive [`Segment::Literal`]s. The empty string parses to a single
/// empty literal, which keeps "format renders verbatim" true for every input
/// without delimiters.
///
/// # Errors
///
/// Returns [`ParseError::EmptyTag`] if the input contains `${}`.
pub fn parse(input: &str) -> Result<Vec<Segment>> {
    let mut segments: Vec<Segment> = Vec::new();

    for token in Tokenizer::new(input) {
        match token {
            Token::Text(text) => push_literal(&mut segments, text),
            Token::Tag { name, param } => {
                let tag = match param {
                    Some(param) => TagRef::with_param(name, param),
                    None => TagRef::new(name),
                };
                segments.push(Segment::Tag(tag));
            }
            Token::EmptyTag(offset) => return Err(ParseError::EmptyTag { offset }),
        }
    }

    if segments.is_empty() {
        segments.push(Segment::Literal(String::new()));
    }

    Ok(segments)
}

/// Returns true if the format string references the tag `name`.
///
/// Malformed input (`${}`) is treated as not referencing anything.
pub fn references(input: &str, name: &str) -> bool {
    Tokenizer::new(input).any(|token| matches!(token, Token::Tag { name: n, .. } if n == name))
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Literal(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Literal(text.to_string()));
    }
}

/// Token types produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// Literal text.
    Text(&'a str),
    /// `${name}` or `${name:param}`.
    Tag {
        name: &'a str,
        param: Option<&'a str>,
    },
    /// `${}` at the given byte offset.
    EmptyTag(usize),
}

/// Tokenizer for `${...}` tags.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        let Some(start) = remaining.find(TAG_START) else {
            self.pos = self.input.len();
            return Some(Token::Text(remaining));
        };

        if start > 0 {
            self.pos += start;
            return Some(Token::Text(&remaining[..start]));
        }

        let body = &remaining[TAG_START.len()..];
        let Some(end) = body.find(TAG_END) else {
            // Unclosed tag: the rest of the input is literal
            self.pos = self.input.len();
            return Some(Token::Text(remaining));
        };

        let offset = self.pos;
        self.pos += TAG_START.len() + end + TAG_END.len_utf8();

        let content = &body[..end];
        if content.is_empty() {
            return Some(Token::EmptyTag(offset));
        }

        Some(match content.split_once(PARAM_SEPARATOR) {
            Some((name, param)) => Token::Tag {
                name,
                param: Some(param),
            },
            None => Token::Tag {
                name: content,
                param: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.to_string())
    }

    fn tag(name: &str) -> Segment {
        Segment::Tag(TagRef::new(name))
    }

    fn ptag(name: &str, param: &str) -> Segment {
        Segment::Tag(TagRef::with_param(name, param))
    }

    mod segments {
        use super::*;

        #[test]
        fn plain_text_is_one_literal() {
            assert_eq!(parse("hello world").unwrap(), vec![lit("hello world")]);
        }

        #[test]
        fn empty_input_is_one_empty_literal() {
            assert_eq!(parse("").unwrap(), vec![lit("")]);
        }

        #[test]
        fn single_tag() {
            assert_eq!(parse("${status}").unwrap(), vec![tag("status")]);
        }

        #[test]
        fn classic_format() {
            assert_eq!(
                parse("${status} - ${method} ${path}\n").unwrap(),
                vec![
                    tag("status"),
                    lit(" - "),
                    tag("method"),
                    lit(" "),
                    tag("path"),
                    lit("\n"),
                ]
            );
        }

        #[test]
        fn adjacent_tags() {
            assert_eq!(
                parse("${red}${status}${reset}").unwrap(),
                vec![tag("red"), tag("status"), tag("reset")]
            );
        }

        #[test]
        fn parameterized_tag() {
            assert_eq!(
                parse("${respHeader:X-Request-ID}").unwrap(),
                vec![ptag("respHeader", "X-Request-ID")]
            );
        }

        #[test]
        fn only_first_colon_splits() {
            assert_eq!(
                parse("${locals:a:b}").unwrap(),
                vec![ptag("locals", "a:b")]
            );
        }

        #[test]
        fn empty_param_is_kept() {
            assert_eq!(parse("${query:}").unwrap(), vec![ptag("query", "")]);
        }

        #[test]
        fn unknown_names_are_still_tags() {
            assert_eq!(parse("${non}").unwrap(), vec![tag("non")]);
        }

        #[test]
        fn order_is_preserved() {
            let parsed = parse("a${x}b${y:1}c").unwrap();
            assert_eq!(
                parsed,
                vec![lit("a"), tag("x"), lit("b"), ptag("y", "1"), lit("c")]
            );
        }
    }

    mod edge_cases {
        use super::*;

        #[test]
        fn unclosed_tag_is_literal() {
            assert_eq!(parse("a ${status").unwrap(), vec![lit("a ${status")]);
        }

        #[test]
        fn lone_dollar_and_braces_are_literal() {
            assert_eq!(parse("$5 {x} }").unwrap(), vec![lit("$5 {x} }")]);
        }

        #[test]
        fn empty_tag_is_an_error() {
            assert_eq!(parse("ab${}"), Err(ParseError::EmptyTag { offset: 2 }));
        }

        #[test]
        fn nested_start_is_part_of_name() {
            // The first `}` closes the tag, whatever came before it
            assert_eq!(
                parse("${a${b}}").unwrap(),
                vec![tag("a${b"), lit("}")]
            );
        }

        #[test]
        fn multibyte_text_around_tags() {
            assert_eq!(
                parse("→ ${path} ←").unwrap(),
                vec![lit("→ "), tag("path"), lit(" ←")]
            );
        }

        #[test]
        fn whitespace_is_not_trimmed() {
            assert_eq!(parse("${ status }").unwrap(), vec![tag(" status ")]);
        }
    }

    mod tokenizer {
        use super::*;

        #[test]
        fn tokenize_mixed() {
            let tokens: Vec<_> = Tokenizer::new("a${b}c${d:e}").collect();
            assert_eq!(
                tokens,
                vec![
                    Token::Text("a"),
                    Token::Tag {
                        name: "b",
                        param: None
                    },
                    Token::Text("c"),
                    Token::Tag {
                        name: "d",
                        param: Some("e")
                    },
                ]
            );
        }

        #[test]
        fn tokenize_empty_tag() {
            let tokens: Vec<_> = Tokenizer::new("${}x").collect();
            assert_eq!(tokens, vec![Token::EmptyTag(0), Token::Text("x")]);
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn references_finds_simple_tag() {
            assert!(references("[${time}] ${status}", "time"));
            assert!(!references("[${status}]", "time"));
        }

        #[test]
        fn references_ignores_literal_text() {
            assert!(!references("time ${timestamp}", "time"));
        }

        #[test]
        fn display_round_trips_syntax() {
            assert_eq!(TagRef::new("pid").to_string(), "${pid}");
            assert_eq!(
                TagRef::with_param("cookie", "session").to_string(),
                "${cookie:session}"
            );
        }
    }
}
