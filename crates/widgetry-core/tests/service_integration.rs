//! Integration tests for the widget list service against an in-memory store.

use std::sync::Arc;

use serde_json::json;

use widgetry_core::{
    JsonMap, Registry, RenderedWidget, StaticFeedSource, StaticUserDirectory, Store, UserRecord,
    WidgetError, WidgetService,
};

const RSS_SAMPLE: &str = r#"<rss version="2.0"><channel>
  <item><title>First</title><link>https://e.com/1</link>
    <pubDate>Mon, 01 Jul 2024 08:00:00 +0000</pubDate></item>
  <item><title>Second</title><link>https://e.com/2</link>
    <pubDate>Tue, 02 Jul 2024 08:00:00 +0000</pubDate></item>
</channel></rss>"#;

fn user(id: i64, username: &str) -> UserRecord {
    UserRecord {
        id,
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        last_login: None,
    }
}

fn service() -> WidgetService {
    let store = Store::open_in_memory().unwrap();
    let registry = Registry::with_defaults().unwrap();
    let users = Arc::new(StaticUserDirectory::new(vec![
        user(1, "ana"),
        user(2, "beth"),
        user(3, "carol"),
    ]));
    let feeds = Arc::new(StaticFeedSource::new(RSS_SAMPLE));
    WidgetService::new(store, registry, users, feeds)
}

fn text_config(body: &str) -> JsonMap {
    serde_json::from_value(json!({ "body": body })).unwrap()
}

fn add_text(service: &WidgetService, list: i64, title: &str) -> Vec<RenderedWidget> {
    service
        .add_widget(list, "Text", title, &text_config(title), None)
        .unwrap()
}

fn titles(widgets: &[RenderedWidget]) -> Vec<&str> {
    widgets.iter().map(|w| w.title.as_str()).collect()
}

fn assert_dense(widgets: &[RenderedWidget]) {
    let positions: Vec<i64> = widgets.iter().map(|w| w.position).collect();
    let expected: Vec<i64> = (0..widgets.len() as i64).collect();
    assert_eq!(positions, expected, "positions must be dense and zero-based");
}

fn widget_id(widgets: &[RenderedWidget], title: &str) -> i64 {
    widgets.iter().find(|w| w.title == title).unwrap().id
}

#[test]
fn list_lifecycle() {
    let service = service();
    assert!(service.list_lists().unwrap().is_empty());

    let ids = service.create_list().unwrap();
    assert_eq!(ids.len(), 1);
    let list = ids[0];
    assert!(service.get_list(list).unwrap().is_empty());

    let ids = service.delete_list(list).unwrap();
    assert!(ids.is_empty());
    assert!(matches!(
        service.get_list(list),
        Err(WidgetError::NotFound { kind: "widget list", .. })
    ));
    assert!(matches!(
        service.delete_list(list),
        Err(WidgetError::NotFound { .. })
    ));
}

#[test]
fn deleting_a_list_cascades_to_its_widgets() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let widgets = add_text(&service, list, "A");
    let id = widget_id(&widgets, "A");

    service.delete_list(list).unwrap();
    assert!(matches!(
        service.get_widget(id),
        Err(WidgetError::NotFound { kind: "widget", .. })
    ));
}

#[test]
fn move_last_widget_to_head() {
    // List [A, B, C]; Move(C, 0) => [C, A, B].
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    add_text(&service, list, "B");
    let widgets = add_text(&service, list, "C");
    let c = widget_id(&widgets, "C");

    let widgets = service.move_widget(c, 0).unwrap();
    assert_eq!(titles(&widgets), ["C", "A", "B"]);
    assert_dense(&widgets);
}

#[test]
fn move_to_current_position_changes_nothing() {
    // List [A, B, C]; Move(C, 2) => unchanged.
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    add_text(&service, list, "B");
    let before = add_text(&service, list, "C");
    let c = widget_id(&before, "C");

    let after = service.move_widget(c, 2).unwrap();
    assert_eq!(after, before);
}

#[test]
fn move_clamps_out_of_range_targets() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let widgets = add_text(&service, list, "A");
    let a = widget_id(&widgets, "A");
    add_text(&service, list, "B");

    // Far beyond the end clamps to the last slot.
    let widgets = service.move_widget(a, 50).unwrap();
    assert_eq!(titles(&widgets), ["B", "A"]);

    // Negative clamps to the head.
    let widgets = service.move_widget(a, -3).unwrap();
    assert_eq!(titles(&widgets), ["A", "B"]);
    assert_dense(&widgets);
}

#[test]
fn add_at_explicit_head_position_shifts_the_rest() {
    // Add at position 0 into [A, B] => [New, A, B].
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    add_text(&service, list, "B");

    let widgets = service
        .add_widget(list, "Text", "New", &text_config("New"), Some(0))
        .unwrap();
    assert_eq!(titles(&widgets), ["New", "A", "B"]);
    assert_dense(&widgets);
}

#[test]
fn add_rejects_out_of_range_positions() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");

    let err = service
        .add_widget(list, "Text", "bad", &text_config("bad"), Some(5))
        .unwrap_err();
    assert!(matches!(
        err,
        WidgetError::PositionOutOfRange { position: 5, len: 1 }
    ));
    // Nothing was persisted.
    assert_eq!(service.get_list(list).unwrap().len(), 1);
}

#[test]
fn remove_middle_widget_compacts_positions() {
    // Remove B from [A, B, C] => [A, C] at positions [0, 1].
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    let widgets = add_text(&service, list, "B");
    let b = widget_id(&widgets, "B");
    add_text(&service, list, "C");

    let widgets = service.delete_widget(b).unwrap();
    assert_eq!(titles(&widgets), ["A", "C"]);
    assert_dense(&widgets);
}

#[test]
fn add_then_remove_restores_the_prior_sequence() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    add_text(&service, list, "B");
    let before = add_text(&service, list, "C");

    let widgets = service
        .add_widget(list, "Text", "New", &text_config("New"), Some(1))
        .unwrap();
    let new = widget_id(&widgets, "New");
    let after = service.delete_widget(new).unwrap();
    assert_eq!(after, before);
}

#[test]
fn positions_stay_dense_across_mixed_operations() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    for i in 0..5 {
        add_text(&service, list, &format!("W{i}"));
    }
    let widgets = service.get_list(list).unwrap();
    let w4 = widget_id(&widgets, "W4");
    let w1 = widget_id(&widgets, "W1");

    let widgets = service.move_widget(w4, 1).unwrap();
    assert_dense(&widgets);
    let widgets = service.delete_widget(w1).unwrap();
    assert_dense(&widgets);
    let widgets = service
        .add_widget(list, "Text", "mid", &text_config("mid"), Some(2))
        .unwrap();
    assert_dense(&widgets);
    let widgets = service.move_widget(w4, 4).unwrap();
    assert_dense(&widgets);
}

#[test]
fn operations_on_independent_lists_do_not_interfere() {
    let service = service();
    let first = service.create_list().unwrap()[0];
    let second = *service.create_list().unwrap().last().unwrap();

    add_text(&service, first, "A");
    add_text(&service, second, "X");
    let widgets = add_text(&service, second, "Y");
    let y = widget_id(&widgets, "Y");
    service.move_widget(y, 0).unwrap();

    assert_eq!(titles(&service.get_list(first).unwrap()), ["A"]);
    assert_eq!(titles(&service.get_list(second).unwrap()), ["Y", "X"]);
}

#[test]
fn missing_required_field_rejects_the_create() {
    let service = service();
    let list = service.create_list().unwrap()[0];

    let err = service
        .add_widget(list, "Text", "No body", &JsonMap::new(), None)
        .unwrap_err();
    match err {
        WidgetError::Validation(errors) => {
            assert_eq!(errors[0].field, "body");
        }
        other => panic!("expected validation error, got {other}"),
    }
    // Zero rows persisted.
    assert!(service.get_list(list).unwrap().is_empty());
}

#[test]
fn missing_title_rejects_the_create() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let err = service
        .add_widget(list, "Text", "", &text_config("body"), None)
        .unwrap_err();
    assert!(matches!(err, WidgetError::Validation(_)));
}

#[test]
fn unknown_widget_class_is_surfaced_not_defaulted() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let err = service
        .add_widget(list, "Bogus", "t", &JsonMap::new(), None)
        .unwrap_err();
    assert!(matches!(err, WidgetError::UnknownWidgetClass(name) if name == "Bogus"));
}

#[test]
fn many_user_config_round_trips_as_ordered_sequence() {
    let service = service();
    let list = service.create_list().unwrap()[0];

    let raw: JsonMap = serde_json::from_value(json!({ "user_ids": [3, 1] })).unwrap();
    let widgets = service
        .add_widget(list, "Many User", "Team", &raw, None)
        .unwrap();
    let id = widget_id(&widgets, "Team");

    // Stored as an ordered sequence, not a set.
    let details = service.get_widget(id).unwrap();
    assert_eq!(details.widget_data["user_ids"], json!([3, 1]));
    assert_eq!(details.widget_data["title"], json!("Team"));
    assert_eq!(details.widget_data["widget_class"], json!("Many User"));

    // The editable form spec still offers the full choice set, ordered by
    // user id.
    let spec = &details.widget_class_configurations["Many User"];
    let choices = spec[1].choices.as_ref().unwrap();
    let values: Vec<i64> = choices.iter().map(|c| c.value.as_i64().unwrap()).collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn text_widget_renders_html_payload() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let widgets = add_text(&service, list, "Hello");

    let widget = &widgets[0];
    assert_eq!(widget.widget_class, "Text");
    assert_eq!(widget.renderer, "default");
    assert_eq!(widget.props["html"], json!("<div>Hello</div>"));
    assert_eq!(widget.position, 0);
}

#[test]
fn rss_widget_renders_canned_feed_newest_first() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    let raw: JsonMap = serde_json::from_value(json!({
        "url": "https://e.com/feed",
        "feed_display_limit": 2,
    }))
    .unwrap();
    let widgets = service
        .add_widget(list, "RSS Feed", "News", &raw, None)
        .unwrap();

    let html = widgets[0].props["html"].as_str().unwrap();
    let second = html.find("Second").unwrap();
    let first = html.find("First").unwrap();
    assert!(second < first, "newest entry must come first");
}

#[test]
fn update_rewrites_config_but_keeps_position() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    add_text(&service, list, "A");
    let widgets = add_text(&service, list, "B");
    let b = widget_id(&widgets, "B");

    let widgets = service
        .update_widget(b, "B edited", &text_config("new body"))
        .unwrap();
    let edited = widgets.iter().find(|w| w.id == b).unwrap();
    assert_eq!(edited.title, "B edited");
    assert_eq!(edited.position, 1);
    assert_eq!(edited.props["html"], json!("<div>new body</div>"));

    // Invalid update persists nothing.
    let err = service.update_widget(b, "t", &JsonMap::new()).unwrap_err();
    assert!(matches!(err, WidgetError::Validation(_)));
    let unchanged = service.get_widget(b).unwrap();
    assert_eq!(unchanged.widget_data["title"], json!("B edited"));
}

#[test]
fn describe_configurations_covers_all_classes_with_title_first() {
    let service = service();
    let configurations = service.describe_configurations().unwrap();
    assert_eq!(configurations.len(), 4);
    for (name, specs) in &configurations {
        assert_eq!(specs[0].key, "title", "{name} must lead with the title field");
        assert!(specs.len() >= 2, "{name} must declare its own fields");
    }
}

#[test]
fn registry_reload_changes_available_classes() {
    let service = service();
    let list = service.create_list().unwrap()[0];
    service.reload_registry(&["url".into()]).unwrap();

    assert!(matches!(
        service.add_widget(list, "Text", "t", &text_config("x"), None),
        Err(WidgetError::UnknownWidgetClass(_))
    ));
    assert_eq!(service.describe_configurations().unwrap().len(), 1);
}
