//! Widget class runtime: validation and render pipelines.
//!
//! A widget instance moves through an explicit pipeline when written:
//! pre-configure (dynamic choice sets) -> per-field validation -> serialize
//! -> post-configure -> storable configuration document. Rendering is an
//! independent pipeline over an already-stored, already-valid instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WidgetError, WidgetResult};
use crate::feed::FeedSource;
use crate::registry::WidgetClass;
use crate::store::WidgetRow;
use crate::JsonMap;

/// A known user identity, as supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Provider of the known user identities.
///
/// Identity storage is an external collaborator; widget classes that need
/// user data take it through this trait so the runtime stays testable with
/// fake directories.
pub trait UserDirectory: Send + Sync {
    /// All known users. Order is not guaranteed; callers sort as needed.
    fn users(&self) -> WidgetResult<Vec<UserRecord>>;
}

/// In-memory [`UserDirectory`].
pub struct StaticUserDirectory {
    users: Vec<UserRecord>,
}

impl StaticUserDirectory {
    /// Directory over a fixed set of users.
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    /// Directory with no users.
    pub fn empty() -> Self {
        Self { users: Vec::new() }
    }
}

impl UserDirectory for StaticUserDirectory {
    fn users(&self) -> WidgetResult<Vec<UserRecord>> {
        Ok(self.users.clone())
    }
}

/// Injected collaborators available to widget-class hooks and renderers.
#[derive(Clone, Copy)]
pub struct RuntimeContext<'a> {
    /// Known user identities.
    pub users: &'a dyn UserDirectory,
    /// Feed document source.
    pub feeds: &'a dyn FeedSource,
}

/// The output of a widget class's render function.
///
/// A class returns either formatted markup or a structured map of renderer
/// props; the runtime branches on the shape rather than assuming one.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Formatted HTML, wrapped by the runtime into an `html` prop.
    Html(String),
    /// Structured props merged as-is; requires a custom client renderer.
    Props(JsonMap),
}

/// A fully rendered widget: instance data merged with the class's render
/// output and renderer hint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedWidget {
    pub id: i64,
    pub widget_list_id: i64,
    pub widget_class: String,
    pub title: String,
    pub position: i64,
    /// Client-side renderer component to use.
    pub renderer: String,
    /// Render payload: `{"html": ...}` or the class's structured props.
    #[serde(flatten)]
    pub props: JsonMap,
}

/// Validate a raw configuration against a widget class and produce the
/// storable configuration document.
///
/// Field failures are aggregated into a single
/// [`WidgetError::Validation`]; nothing is persisted on failure. Keys in the
/// raw document that no field claims are dropped.
pub fn validate_configuration(
    class: &dyn WidgetClass,
    raw: &JsonMap,
    ctx: &RuntimeContext<'_>,
) -> WidgetResult<JsonMap> {
    let mut fields = class.fields();
    class.pre_configure(&mut fields, ctx)?;

    let mut errors = Vec::new();
    let mut config = JsonMap::new();
    for binding in &fields {
        match binding.descriptor.validate(&binding.key, raw.get(&binding.key)) {
            Ok(Some(validated)) => {
                config.insert(
                    binding.key.clone(),
                    binding.descriptor.serialize(validated),
                );
            }
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(WidgetError::Validation(errors));
    }

    class.post_configure(&mut config)?;
    Ok(config)
}

/// Render a stored widget instance through its class.
pub fn render_instance(
    class: &dyn WidgetClass,
    row: &WidgetRow,
    ctx: &RuntimeContext<'_>,
) -> WidgetResult<RenderedWidget> {
    let props = match class.render(&row.configuration, ctx)? {
        Rendered::Html(html) => {
            let mut map = JsonMap::new();
            map.insert("html".into(), Value::String(html));
            map
        }
        Rendered::Props(map) => map,
    };
    Ok(RenderedWidget {
        id: row.id,
        widget_list_id: row.widget_list_id,
        widget_class: row.widget_class.clone(),
        title: row.title.clone(),
        position: row.position,
        renderer: class.renderer().to_string(),
        props,
    })
}

/// Escape text for interpolation into HTML markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::StaticFeedSource;
    use crate::fields::{FieldBinding, FieldDescriptor};
    use serde_json::json;

    struct TwoFieldClass;

    impl WidgetClass for TwoFieldClass {
        fn name(&self) -> &'static str {
            "Two Field"
        }

        fn fields(&self) -> Vec<FieldBinding> {
            vec![
                FieldBinding::new("body", FieldDescriptor::char().with_max_length(10)),
                FieldBinding::new(
                    "count",
                    FieldDescriptor::integer().with_min_value(0).with_max_value(5),
                ),
            ]
        }

        fn render(&self, config: &JsonMap, _ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
            Ok(Rendered::Props(config.clone()))
        }
    }

    fn test_ctx<'a>(
        users: &'a StaticUserDirectory,
        feeds: &'a StaticFeedSource,
    ) -> RuntimeContext<'a> {
        RuntimeContext { users, feeds }
    }

    #[test]
    fn validation_aggregates_all_field_errors() {
        let users = StaticUserDirectory::empty();
        let feeds = StaticFeedSource::new("");
        let ctx = test_ctx(&users, &feeds);
        let raw = serde_json::from_value::<JsonMap>(json!({
            "body": "way too long for the field",
            "count": 9,
        }))
        .unwrap();
        let err = validate_configuration(&TwoFieldClass, &raw, &ctx).unwrap_err();
        match err {
            WidgetError::Validation(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].field, "body");
                assert_eq!(errors[1].field, "count");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn validation_drops_unclaimed_keys() {
        let users = StaticUserDirectory::empty();
        let feeds = StaticFeedSource::new("");
        let ctx = test_ctx(&users, &feeds);
        let raw = serde_json::from_value::<JsonMap>(json!({
            "body": "ok",
            "count": 2,
            "stray": "not a field",
        }))
        .unwrap();
        let config = validate_configuration(&TwoFieldClass, &raw, &ctx).unwrap();
        assert_eq!(config.get("body"), Some(&json!("ok")));
        assert_eq!(config.get("count"), Some(&json!(2)));
        assert!(!config.contains_key("stray"));
    }

    #[test]
    fn html_render_is_wrapped_into_html_prop() {
        struct HtmlClass;
        impl WidgetClass for HtmlClass {
            fn name(&self) -> &'static str {
                "Html"
            }
            fn fields(&self) -> Vec<FieldBinding> {
                Vec::new()
            }
            fn render(
                &self,
                _config: &JsonMap,
                _ctx: &RuntimeContext<'_>,
            ) -> WidgetResult<Rendered> {
                Ok(Rendered::Html("<div>hi</div>".into()))
            }
        }

        let users = StaticUserDirectory::empty();
        let feeds = StaticFeedSource::new("");
        let ctx = test_ctx(&users, &feeds);
        let row = WidgetRow {
            id: 7,
            widget_list_id: 1,
            widget_class: "Html".into(),
            title: "A widget".into(),
            configuration: JsonMap::new(),
            position: 0,
        };
        let rendered = render_instance(&HtmlClass, &row, &ctx).unwrap();
        assert_eq!(rendered.props.get("html"), Some(&json!("<div>hi</div>")));
        assert_eq!(rendered.renderer, "default");
        assert_eq!(rendered.title, "A widget");
        assert_eq!(rendered.position, 0);
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("a & b"), "a &amp; b");
    }
}
