//! Compiled templates.
//!
//! A format string is parsed and bound to resolvers once, at setup. The
//! resulting [`Template`] is an immutable list of [`CompiledSegment`]s that
//! every request walks in order.

use std::fmt;

use tagline_parser::{ParseError, Segment, TagRef};

use crate::buffer::LineBuffer;
use crate::data::Data;
use crate::error::Result;
use crate::registry::{SharedResolver, TagRegistry};

/// One unit of a compiled template.
#[derive(Clone)]
pub enum CompiledSegment {
    /// Bytes copied to the line verbatim.
    Literal(Box<[u8]>),
    /// A tag bound to its resolver. `resolver` is `None` for names the
    /// registry did not know at compile time; such tags render nothing.
    Tag {
        tag: TagRef,
        resolver: Option<SharedResolver>,
    },
}

impl CompiledSegment {
    /// The tag reference, if this is a tag segment.
    pub fn tag(&self) -> Option<&TagRef> {
        match self {
            CompiledSegment::Tag { tag, .. } => Some(tag),
            CompiledSegment::Literal(_) => None,
        }
    }

    /// Returns true for tag segments that resolved at compile time.
    pub fn is_bound(&self) -> bool {
        matches!(self, CompiledSegment::Tag { resolver: Some(_), .. })
    }

    fn render(&self, out: &mut LineBuffer, data: &Data<'_>) -> Result<usize> {
        match self {
            CompiledSegment::Literal(bytes) => out.write_bytes(bytes),
            CompiledSegment::Tag {
                tag,
                resolver: Some(resolver),
            } => resolver.resolve(out, data, tag.param().unwrap_or("")),
            CompiledSegment::Tag { resolver: None, .. } => Ok(0),
        }
    }
}

impl fmt::Debug for CompiledSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledSegment::Literal(bytes) => f
                .debug_tuple("Literal")
                .field(&String::from_utf8_lossy(bytes))
                .finish(),
            CompiledSegment::Tag { tag, resolver } => f
                .debug_struct("Tag")
                .field("tag", &tag.to_string())
                .field("bound", &resolver.is_some())
                .finish(),
        }
    }
}

/// A format string compiled against a tag registry.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<CompiledSegment>,
}

impl Template {
    /// Parses `format` and binds each tag to its resolver.
    ///
    /// Unknown tags are kept as unbound segments and render empty. The only
    /// error is a malformed tag such as `${}`.
    pub fn compile(format: &str, registry: &TagRegistry) -> std::result::Result<Self, ParseError> {
        let segments = tagline_parser::parse(format)?
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(text) => CompiledSegment::Literal(text.into_bytes().into_boxed_slice()),
                Segment::Tag(tag) => {
                    let resolver = registry.resolve(tag.name());
                    if resolver.is_none() {
                        tracing::debug!(tag = %tag, "unknown tag renders empty");
                    }
                    CompiledSegment::Tag { tag, resolver }
                }
            })
            .collect();

        Ok(Self {
            source: format.to_string(),
            segments,
        })
    }

    /// Renders the template into `out`.
    ///
    /// Segments are written in template order. The first failed write aborts
    /// the render; bytes written before it stay in the buffer.
    pub fn render(&self, out: &mut LineBuffer, data: &Data<'_>) -> Result<usize> {
        let mut written = 0;
        for segment in &self.segments {
            written += segment.render(out, data)?;
        }
        Ok(written)
    }

    /// Returns true if any segment is the tag `name`.
    pub fn references(&self, name: &str) -> bool {
        self.segments
            .iter()
            .filter_map(CompiledSegment::tag)
            .any(|tag| tag.name() == name)
    }

    /// The compiled segments, in render order.
    pub fn segments(&self) -> &[CompiledSegment] {
        &self.segments
    }

    /// The format string this template was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}
