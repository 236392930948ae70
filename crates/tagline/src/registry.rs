//! Tag registry: maps tag names to resolvers.
//!
//! A [`TagRegistry`] holds two layers:
//!
//! 1. Custom tags, registered by the application.
//! 2. Built-in tags, installed by [`TagRegistry::builtin`].
//!
//! Lookups check custom tags first, so an application can replace a built-in
//! by registering a tag with the same name. Registering the same custom name
//! twice replaces the earlier resolver (last registration wins). Both cases
//! are reported through the returned [`Registration`] so callers can detect
//! them.
//!
//! # Example
//!
//! ```rust
//! use tagline::{LineBuffer, Registration, TagRegistry};
//!
//! let mut registry = TagRegistry::new();
//! let outcome = registry.register("service", |out: &mut LineBuffer, _: &tagline::Data<'_>, _: &str| {
//!     out.write_str("billing")
//! });
//! assert_eq!(outcome, Registration::Added);
//! assert!(registry.resolve("service").is_some());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::buffer::LineBuffer;
use crate::color::ColorScheme;
use crate::data::Data;
use crate::error::Result;

/// Renders one tag into the line buffer.
///
/// `param` is the text after the colon in `${prefix:param}`, fixed when the
/// format is compiled, or `""` for tags written without one. A resolver that
/// has nothing to say writes nothing and returns `Ok(0)`; errors are reserved
/// for write failures.
pub trait Resolver: Send + Sync {
    /// Writes the tag's value and returns the number of bytes written.
    fn resolve(&self, out: &mut LineBuffer, data: &Data<'_>, param: &str) -> Result<usize>;
}

impl<F> Resolver for F
where
    F: Fn(&mut LineBuffer, &Data<'_>, &str) -> Result<usize> + Send + Sync,
{
    fn resolve(&self, out: &mut LineBuffer, data: &Data<'_>, param: &str) -> Result<usize> {
        self(out, data, param)
    }
}

/// Shared handle to a resolver.
pub type SharedResolver = Arc<dyn Resolver>;

/// What a registration did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The name was not taken.
    Added,
    /// The name belongs to a built-in, which is now shadowed.
    ShadowedBuiltin,
    /// An earlier custom tag with this name was replaced.
    Replaced,
}

/// Mapping from tag name to resolver.
#[derive(Clone, Default)]
pub struct TagRegistry {
    custom: HashMap<String, SharedResolver>,
    builtins: HashMap<String, SharedResolver>,
}

impl TagRegistry {
    /// Creates an empty registry with no built-in tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in tag.
    ///
    /// When `colored` is set, `status`, `method` and `error` are wrapped in
    /// the scheme's colors.
    pub fn builtin(scheme: &ColorScheme, colored: bool) -> Self {
        let mut registry = Self::new();
        crate::tags::install(&mut registry, scheme, colored);
        registry
    }

    /// Registers a custom tag from a closure or function.
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F) -> Registration
    where
        F: Fn(&mut LineBuffer, &Data<'_>, &str) -> Result<usize> + Send + Sync + 'static,
    {
        self.register_shared(name, Arc::new(resolver))
    }

    /// Registers a custom tag from a shared resolver.
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        resolver: SharedResolver,
    ) -> Registration {
        let name = name.into();
        let shadows = self.builtins.contains_key(&name);
        let replaced = self.custom.insert(name.clone(), resolver).is_some();

        let outcome = if replaced {
            Registration::Replaced
        } else if shadows {
            Registration::ShadowedBuiltin
        } else {
            Registration::Added
        };
        if outcome != Registration::Added {
            tracing::debug!(tag = %name, ?outcome, "custom tag overrides an existing resolver");
        }
        outcome
    }

    /// Installs a built-in tag. Built-ins never shadow custom tags.
    pub(crate) fn install_builtin(&mut self, name: &str, resolver: SharedResolver) {
        self.builtins.insert(name.to_string(), resolver);
    }

    /// Finds the resolver for a name, custom tags first.
    pub fn resolve(&self, name: &str) -> Option<SharedResolver> {
        self.custom
            .get(name)
            .or_else(|| self.builtins.get(name))
            .cloned()
    }

    /// Returns true if any resolver answers to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || self.builtins.contains_key(name)
    }

    /// Returns true if `name` is a built-in tag, shadowed or not.
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Returns true if `name` is a custom tag.
    pub fn is_custom(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    /// All names the registry answers to, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .custom
            .keys()
            .chain(self.builtins.keys().filter(|k| !self.custom.contains_key(*k)))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Returns true if no tag is registered.
    pub fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.builtins.is_empty()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .field("builtins", &self.builtins.len())
            .finish()
    }
}
