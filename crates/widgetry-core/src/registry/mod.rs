//! Widget class registry: name-keyed lookup of widget-class definitions.
//!
//! The registry is built once at startup from a list of class identifiers
//! and read concurrently without locking afterwards. Reload replaces the
//! whole table atomically so readers never observe a partially loaded
//! registry.

pub mod classes;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{WidgetError, WidgetResult};
use crate::fields::{FieldBinding, FieldDescriptor, FormFieldSpec};
use crate::runtime::{Rendered, RuntimeContext};
use crate::JsonMap;

/// A named widget-class definition: an ordered field schema, a render
/// function and optional pre/post-configure hooks.
pub trait WidgetClass: Send + Sync {
    /// Registry key for this class, e.g. `"Text"`.
    fn name(&self) -> &'static str;

    /// The class's field schema, in declaration order.
    fn fields(&self) -> Vec<FieldBinding>;

    /// Adjust the field schema right before validation or form description.
    ///
    /// Runs once per operation and may replace dynamic choice sets from the
    /// injected data sources (e.g. the current user directory).
    fn pre_configure(
        &self,
        _fields: &mut [FieldBinding],
        _ctx: &RuntimeContext<'_>,
    ) -> WidgetResult<()> {
        Ok(())
    }

    /// Last chance to normalize the validated configuration before storage.
    fn post_configure(&self, _config: &mut JsonMap) -> WidgetResult<()> {
        Ok(())
    }

    /// Produce the render payload for a stored configuration.
    fn render(&self, config: &JsonMap, ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered>;

    /// Client-side renderer component this class targets.
    fn renderer(&self) -> &'static str {
        "default"
    }
}

impl std::fmt::Debug for dyn WidgetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetClass")
            .field("name", &self.name())
            .finish()
    }
}

/// Resolve a class identifier to its builtin definition.
fn resolve(identifier: &str) -> Option<Arc<dyn WidgetClass>> {
    match identifier {
        "text" => Some(Arc::new(classes::TextWidget)),
        "url" => Some(Arc::new(classes::UrlWidget)),
        "many-user" => Some(Arc::new(classes::ManyUserWidget)),
        "rss-feed" => Some(Arc::new(classes::RssFeedWidget)),
        "file" => Some(Arc::new(classes::FileWidget)),
        _ => None,
    }
}

/// Class identifiers enabled when the configuration does not say otherwise.
pub fn default_identifiers() -> Vec<String> {
    ["text", "url", "many-user", "rss-feed"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Immutable name-keyed table of widget-class definitions.
#[derive(Debug)]
pub struct Registry {
    classes: Vec<Arc<dyn WidgetClass>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from an ordered sequence of class identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Configuration`] if an identifier cannot be
    /// resolved or two identifiers resolve to the same class name. Fatal at
    /// startup.
    pub fn load(identifiers: &[String]) -> WidgetResult<Self> {
        let mut classes: Vec<Arc<dyn WidgetClass>> = Vec::with_capacity(identifiers.len());
        let mut by_name = HashMap::with_capacity(identifiers.len());
        for identifier in identifiers {
            let class = resolve(identifier).ok_or_else(|| {
                WidgetError::configuration(format!(
                    "unresolvable widget class identifier '{identifier}'"
                ))
            })?;
            let name = class.name().to_string();
            if by_name.contains_key(&name) {
                return Err(WidgetError::configuration(format!(
                    "duplicate widget class name '{name}'"
                )));
            }
            by_name.insert(name, classes.len());
            classes.push(class);
        }
        Ok(Self { classes, by_name })
    }

    /// Registry over the default class identifiers.
    pub fn with_defaults() -> WidgetResult<Self> {
        Self::load(&default_identifiers())
    }

    /// Look up a class definition by name.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::UnknownWidgetClass`] if absent; a stored
    /// instance naming a missing class is surfaced, never silently
    /// defaulted.
    pub fn get(&self, name: &str) -> WidgetResult<Arc<dyn WidgetClass>> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.classes[index]))
            .ok_or_else(|| WidgetError::UnknownWidgetClass(name.to_string()))
    }

    /// Registered class names, in load order.
    pub fn names(&self) -> Vec<&'static str> {
        self.classes.iter().map(|class| class.name()).collect()
    }

    /// Form specs for every registered class: the shared title field first,
    /// then the class's own fields in declaration order.
    ///
    /// Pre-configure hooks run here so dynamic choice sets are current;
    /// drives the "add widget" form without needing an instance.
    pub fn describe_configurations(
        &self,
        ctx: &RuntimeContext<'_>,
    ) -> WidgetResult<BTreeMap<String, Vec<FormFieldSpec>>> {
        let mut configurations = BTreeMap::new();
        for class in &self.classes {
            configurations.insert(
                class.name().to_string(),
                self.describe_class(class.as_ref(), ctx)?,
            );
        }
        Ok(configurations)
    }

    /// Form specs for a single class, title field included.
    pub fn describe_class(
        &self,
        class: &dyn WidgetClass,
        ctx: &RuntimeContext<'_>,
    ) -> WidgetResult<Vec<FormFieldSpec>> {
        let mut fields = class.fields();
        class.pre_configure(&mut fields, ctx)?;
        let mut specs = vec![title_field().form_spec("title")];
        specs.extend(fields.iter().map(FieldBinding::form_spec));
        Ok(specs)
    }
}

/// The title field shared by every widget class. Always first in a form
/// spec.
pub fn title_field() -> FieldDescriptor {
    FieldDescriptor::char()
        .with_max_length(200)
        .with_label("Title")
        .with_placeholder("Enter widget title")
        .with_auto_focus()
}

/// Process-wide registry handle with atomic replace-on-reload.
pub struct SharedRegistry {
    inner: ArcSwap<Registry>,
}

impl SharedRegistry {
    /// Wrap an initial registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: ArcSwap::from_pointee(registry),
        }
    }

    /// Current registry snapshot. Cheap; safe to call per request.
    pub fn load(&self) -> Arc<Registry> {
        self.inner.load_full()
    }

    /// Rebuild the registry from `identifiers` and swap it in atomically.
    ///
    /// Concurrent readers keep their old snapshot until they next call
    /// [`SharedRegistry::load`].
    pub fn reload(&self, identifiers: &[String]) -> WidgetResult<()> {
        let registry = Registry::load(identifiers)?;
        self.inner.store(Arc::new(registry));
        Ok(())
    }
}
