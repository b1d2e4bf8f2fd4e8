//! Built-in widget classes.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{WidgetError, WidgetResult};
use crate::feed;
use crate::fields::{Choice, FieldBinding, FieldDescriptor};
use crate::registry::WidgetClass;
use crate::runtime::{escape_html, Rendered, RuntimeContext};
use crate::JsonMap;

/// A basic text widget.
///
/// Fields:
/// - `body`: inner text of the widget
pub struct TextWidget;

impl WidgetClass for TextWidget {
    fn name(&self) -> &'static str {
        "Text"
    }

    fn fields(&self) -> Vec<FieldBinding> {
        vec![FieldBinding::new(
            "body",
            FieldDescriptor::char().with_placeholder("Enter widget text"),
        )]
    }

    fn render(&self, config: &JsonMap, _ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
        let body = config_str(config, "body");
        Ok(Rendered::Html(format!("<div>{}</div>", escape_html(body))))
    }
}

/// A basic URL widget rendered as an iframe embed.
///
/// Fields:
/// - `url`: URL to use in the iframe
pub struct UrlWidget;

impl WidgetClass for UrlWidget {
    fn name(&self) -> &'static str {
        "URL"
    }

    fn fields(&self) -> Vec<FieldBinding> {
        vec![FieldBinding::new(
            "url",
            FieldDescriptor::url().with_placeholder("Enter URL"),
        )]
    }

    fn render(&self, config: &JsonMap, _ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
        let url = config_str(config, "url");
        Ok(Rendered::Html(format!(
            "<iframe src=\"{}\"></iframe>",
            escape_html(url)
        )))
    }
}

/// Select any number of known users and display a profile summary table.
///
/// Fields:
/// - `user_ids`: selected users; the choice set is populated at validation
///   time from the user directory, ordered by user id
pub struct ManyUserWidget;

impl WidgetClass for ManyUserWidget {
    fn name(&self) -> &'static str {
        "Many User"
    }

    fn fields(&self) -> Vec<FieldBinding> {
        vec![FieldBinding::new(
            "user_ids",
            FieldDescriptor::multi_choice(Vec::new()).with_placeholder("Select users"),
        )]
    }

    fn pre_configure(
        &self,
        fields: &mut [FieldBinding],
        ctx: &RuntimeContext<'_>,
    ) -> WidgetResult<()> {
        let mut users = ctx.users.users()?;
        users.sort_by_key(|user| user.id);
        let choices: Vec<Choice> = users
            .into_iter()
            .map(|user| Choice::new(user.id, user.username))
            .collect();
        if let Some(binding) = fields.iter_mut().find(|b| b.key == "user_ids") {
            binding.descriptor.set_choices(choices);
        }
        Ok(())
    }

    fn render(&self, config: &JsonMap, ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
        let selected: Vec<i64> = config
            .get("user_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        let users: HashMap<i64, _> = ctx
            .users
            .users()?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut html = String::from(
            "<table><tr><th>Username</th><th>Last Name</th><th>First Name</th>\
             <th>Last Logged In</th></tr>",
        );
        for id in selected {
            let Some(user) = users.get(&id) else {
                // User removed since the widget was configured.
                continue;
            };
            let last_login = user
                .last_login
                .map(|ts| ts.format("%m/%d/%Y %I:%M%p").to_string())
                .unwrap_or_default();
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&user.username),
                escape_html(&user.last_name),
                escape_html(&user.first_name),
                last_login,
            ));
        }
        html.push_str("</table>");
        Ok(Rendered::Html(html))
    }
}

/// Fetch an external RSS/Atom feed and render the newest entries as dated
/// links.
///
/// Fields:
/// - `url`: feed URL
/// - `feed_display_limit`: how many entries to display (0-12, default 3)
pub struct RssFeedWidget;

impl RssFeedWidget {
    const DEFAULT_DISPLAY_LIMIT: i64 = 3;
    const FALLBACK: &'static str =
        "<p>No RSS entries found. You may have selected an invalid RSS url.</p>";
}

impl WidgetClass for RssFeedWidget {
    fn name(&self) -> &'static str {
        "RSS Feed"
    }

    fn fields(&self) -> Vec<FieldBinding> {
        vec![
            FieldBinding::new(
                "url",
                FieldDescriptor::url().with_placeholder("Enter RSS Feed URL"),
            ),
            FieldBinding::new(
                "feed_display_limit",
                FieldDescriptor::integer()
                    .with_min_value(0)
                    .with_max_value(12)
                    .optional()
                    .with_default(Self::DEFAULT_DISPLAY_LIMIT),
            ),
        ]
    }

    fn render(&self, config: &JsonMap, ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
        let url = config_str(config, "url");
        let limit = config
            .get("feed_display_limit")
            .and_then(Value::as_i64)
            .unwrap_or(Self::DEFAULT_DISPLAY_LIMIT)
            .max(0);

        // A dead or slow feed degrades to the fallback message; fetch
        // failures never propagate to the list-render caller.
        let body = match ctx.feeds.fetch(url) {
            Ok(body) => body,
            Err(WidgetError::ExternalFetch(_)) => return Ok(Rendered::Html(Self::FALLBACK.into())),
            Err(err) => return Err(err),
        };
        let mut entries = feed::parse_feed(&body);
        if entries.is_empty() {
            return Ok(Rendered::Html(Self::FALLBACK.into()));
        }
        feed::sort_entries_desc(&mut entries);

        let mut html = String::new();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        for entry in entries.iter().take(limit as usize) {
            let title = entry.title.as_deref().unwrap_or("(untitled)");
            let link = entry.link.as_deref().unwrap_or("#");
            let prefix = entry
                .timestamp
                .as_ref()
                .map(|ts| format!("{} | ", feed::format_timestamp(ts)))
                .unwrap_or_default();
            html.push_str(&format!(
                "<p><a href=\"{}\">{}{}</a></p>",
                escape_html(link),
                prefix,
                escape_html(title),
            ));
        }
        Ok(Rendered::Html(html))
    }
}

/// UNIMPLEMENTED: upload a file and display a download link.
///
/// Declared for schema completeness only; render is a placeholder.
pub struct FileWidget;

impl WidgetClass for FileWidget {
    fn name(&self) -> &'static str {
        "File"
    }

    fn fields(&self) -> Vec<FieldBinding> {
        vec![FieldBinding::new("file", FieldDescriptor::file().optional())]
    }

    fn render(&self, _config: &JsonMap, _ctx: &RuntimeContext<'_>) -> WidgetResult<Rendered> {
        Ok(Rendered::Props(JsonMap::new()))
    }
}

fn config_str<'a>(config: &'a JsonMap, key: &str) -> &'a str {
    config.get(key).and_then(Value::as_str).unwrap_or_default()
}
