//! Widget list service: the operations exposed at the external boundary.
//!
//! Composes the registry, runtime, ordering engine and store. Every mutating
//! operation runs inside an immediate transaction (serializing position
//! changes on the list) and returns the freshly re-rendered, position-ordered
//! widget list so callers always observe a consistent post-state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::TransactionBehavior;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::WidgetryConfig;
use crate::error::{WidgetError, WidgetResult};
use crate::feed::{FeedSource, HttpFeedSource};
use crate::fields::FormFieldSpec;
use crate::ordering::{self, NewWidget};
use crate::registry::{title_field, Registry, SharedRegistry};
use crate::runtime::{
    self, RenderedWidget, RuntimeContext, StaticUserDirectory, UserDirectory,
};
use crate::store::Store;
use crate::JsonMap;

/// Response for a single-widget fetch: the flat form data for editing plus
/// the class's form spec.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDetails {
    /// Stored configuration flattened together with `title` and
    /// `widget_class`, ready to repopulate an edit form.
    pub widget_data: JsonMap,
    /// Form spec for this widget's class only.
    pub widget_class_configurations: BTreeMap<String, Vec<FormFieldSpec>>,
}

/// The widget list service.
pub struct WidgetService {
    store: Store,
    registry: SharedRegistry,
    users: Arc<dyn UserDirectory>,
    feeds: Arc<dyn FeedSource>,
}

impl WidgetService {
    /// Build a service from its parts.
    pub fn new(
        store: Store,
        registry: Registry,
        users: Arc<dyn UserDirectory>,
        feeds: Arc<dyn FeedSource>,
    ) -> Self {
        Self {
            store,
            registry: SharedRegistry::new(registry),
            users,
            feeds,
        }
    }

    /// Build a service from a loaded configuration: SQLite store at the
    /// configured path, registry over the configured classes, users from the
    /// configured identity file, HTTP feed source with the configured
    /// timeout.
    pub fn from_config(config: &WidgetryConfig) -> WidgetResult<Self> {
        let store = Store::open(&config.db_path)?;
        let registry = Registry::load(&config.widget_classes)?;
        let users = Arc::new(StaticUserDirectory::new(config.load_users()?));
        let feeds = Arc::new(HttpFeedSource::new(Duration::from_millis(
            config.feed_timeout_ms,
        ))?);
        Ok(Self::new(store, registry, users, feeds))
    }

    /// Swap in a registry built from `identifiers`. Atomic; in-flight
    /// readers keep their snapshot.
    pub fn reload_registry(&self, identifiers: &[String]) -> WidgetResult<()> {
        info!(classes = identifiers.len(), "reloading widget class registry");
        self.registry.reload(identifiers)
    }

    fn ctx(&self) -> RuntimeContext<'_> {
        RuntimeContext {
            users: self.users.as_ref(),
            feeds: self.feeds.as_ref(),
        }
    }

    /// Ids of all widget lists.
    pub fn list_lists(&self) -> WidgetResult<Vec<i64>> {
        with_read_retry(|| self.store.list_ids())
    }

    /// Create an empty widget list; returns the updated list of ids.
    pub fn create_list(&self) -> WidgetResult<Vec<i64>> {
        let id = self.store.create_list()?;
        info!(list_id = id, "created widget list");
        self.store.list_ids()
    }

    /// Delete a widget list and everything in it; returns the updated list
    /// of ids.
    pub fn delete_list(&self, list_id: i64) -> WidgetResult<Vec<i64>> {
        self.store.delete_list(list_id)?;
        info!(list_id, "deleted widget list");
        self.store.list_ids()
    }

    /// The rendered, position-ordered widgets of a list.
    pub fn get_list(&self, list_id: i64) -> WidgetResult<Vec<RenderedWidget>> {
        with_read_retry(|| {
            self.ensure_list(list_id)?;
            self.render_list(list_id)
        })
    }

    /// Form specs for every registered widget class. Drives the "add
    /// widget" form.
    pub fn describe_configurations(
        &self,
    ) -> WidgetResult<BTreeMap<String, Vec<FormFieldSpec>>> {
        self.registry.load().describe_configurations(&self.ctx())
    }

    /// Validate and store a new widget, optionally at an explicit position.
    ///
    /// Appends when `position` is `None`. An explicit out-of-range position
    /// is rejected with [`WidgetError::PositionOutOfRange`]. Nothing is
    /// persisted unless the whole configuration validates.
    pub fn add_widget(
        &self,
        list_id: i64,
        class_name: &str,
        title: &str,
        raw: &JsonMap,
        position: Option<i64>,
    ) -> WidgetResult<Vec<RenderedWidget>> {
        self.ensure_list(list_id)?;
        let class = self.registry.load().get(class_name)?;
        let title = validate_title(title)?;
        let configuration = runtime::validate_configuration(class.as_ref(), raw, &self.ctx())?;

        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let widget_id = ordering::insert_at(
            &tx,
            &NewWidget {
                widget_list_id: list_id,
                widget_class: class.name(),
                title: &title,
                configuration: &configuration,
            },
            position,
        )?;
        tx.commit()?;
        drop(conn);
        info!(list_id, widget_id, class = class.name(), "added widget");
        self.render_list(list_id)
    }

    /// Data for editing a single widget: its flat form data and its class's
    /// form spec.
    pub fn get_widget(&self, widget_id: i64) -> WidgetResult<WidgetDetails> {
        let row = self.store.get_widget(widget_id)?;
        let registry = self.registry.load();
        let class = registry.get(&row.widget_class)?;

        let mut widget_data = row.configuration.clone();
        widget_data.insert("title".into(), Value::String(row.title.clone()));
        widget_data.insert(
            "widget_class".into(),
            Value::String(row.widget_class.clone()),
        );

        let mut widget_class_configurations = BTreeMap::new();
        widget_class_configurations.insert(
            row.widget_class.clone(),
            registry.describe_class(class.as_ref(), &self.ctx())?,
        );
        Ok(WidgetDetails {
            widget_data,
            widget_class_configurations,
        })
    }

    /// Re-validate and overwrite a widget's title and configuration. The
    /// widget keeps its position.
    pub fn update_widget(
        &self,
        widget_id: i64,
        title: &str,
        raw: &JsonMap,
    ) -> WidgetResult<Vec<RenderedWidget>> {
        let row = self.store.get_widget(widget_id)?;
        let class = self.registry.load().get(&row.widget_class)?;
        let title = validate_title(title)?;
        let configuration = runtime::validate_configuration(class.as_ref(), raw, &self.ctx())?;

        self.store.update_widget(widget_id, &title, &configuration)?;
        debug!(widget_id, "updated widget");
        self.render_list(row.widget_list_id)
    }

    /// Reposition a widget within its list. Out-of-range targets are
    /// clamped, so a move always succeeds; moving to the current position is
    /// a no-op.
    pub fn move_widget(
        &self,
        widget_id: i64,
        target_position: i64,
    ) -> WidgetResult<Vec<RenderedWidget>> {
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let list_id = ordering::move_to(&tx, widget_id, target_position)?;
        tx.commit()?;
        drop(conn);
        debug!(widget_id, target_position, "moved widget");
        self.render_list(list_id)
    }

    /// Delete a widget and compact its list's positions.
    pub fn delete_widget(&self, widget_id: i64) -> WidgetResult<Vec<RenderedWidget>> {
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let list_id = ordering::remove(&tx, widget_id)?;
        tx.commit()?;
        drop(conn);
        info!(widget_id, list_id, "deleted widget");
        self.render_list(list_id)
    }

    fn ensure_list(&self, list_id: i64) -> WidgetResult<()> {
        if self.store.list_exists(list_id)? {
            Ok(())
        } else {
            Err(WidgetError::NotFound {
                kind: "widget list",
                id: list_id,
            })
        }
    }

    fn render_list(&self, list_id: i64) -> WidgetResult<Vec<RenderedWidget>> {
        let registry = self.registry.load();
        let ctx = self.ctx();
        self.store
            .widgets_in_list(list_id)?
            .iter()
            .map(|row| {
                let class = registry.get(&row.widget_class)?;
                runtime::render_instance(class.as_ref(), row, &ctx)
            })
            .collect()
    }
}

/// Validate the shared title field: required, at most 200 characters.
fn validate_title(title: &str) -> WidgetResult<String> {
    if title.trim().is_empty() {
        return Err(WidgetError::validation("title", "this field is required"));
    }
    let validated = title_field()
        .validate("title", Some(&Value::String(title.to_string())))
        .map_err(|err| WidgetError::Validation(vec![err]))?;
    // A present value always validates to Some.
    match validated {
        Some(value) => {
            if let Value::String(text) = title_field().serialize(value) {
                Ok(text)
            } else {
                Ok(title.to_string())
            }
        }
        None => Ok(title.to_string()),
    }
}

/// Run a read-only operation, retrying once if the database was busy.
/// Mutating operations are never retried here; a blind retry could
/// double-shift positions.
fn with_read_retry<T>(f: impl Fn() -> WidgetResult<T>) -> WidgetResult<T> {
    match f() {
        Err(WidgetError::Storage(msg))
            if msg.contains("locked") || msg.contains("busy") =>
        {
            debug!("read hit a busy database, retrying once");
            f()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required_and_bounded() {
        assert!(matches!(
            validate_title(""),
            Err(WidgetError::Validation(errors)) if errors[0].field == "title"
        ));
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
        assert_eq!(validate_title("A widget").unwrap(), "A widget");
    }
}
