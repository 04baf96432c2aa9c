//! JSON bodies for the Micropub endpoint.
//!
//! A property is sent only when it carries a value. Omitting a field and sending it
//! empty mean different things to the server, so blank metadata never reaches the wire.

use serde_json::{Map, Value, json};

use crate::domain::entry::Entry;

/// `{"type":["h-entry"],"properties":{...}}`
pub fn create_payload(entry: &Entry) -> Value {
    json!({
        "type": ["h-entry"],
        "properties": properties(entry, true),
    })
}

/// `{"action":"update","url":...,"replace":{...}}`. The slug is fixed once published.
pub fn update_payload(url: &str, entry: &Entry) -> Value {
    json!({
        "action": "update",
        "url": url,
        "replace": properties(entry, false),
    })
}

pub fn delete_payload(url: &str) -> Value {
    json!({
        "action": "delete",
        "url": url,
    })
}

fn properties(entry: &Entry, with_slug: bool) -> Map<String, Value> {
    let meta = &entry.meta;
    let mut props = Map::new();
    props.insert("content".into(), json!([entry.content]));

    if let Some(name) = meta.name() {
        props.insert("name".into(), json!([name]));
    }
    let categories = meta.categories();
    if !categories.is_empty() {
        props.insert("category".into(), json!(categories));
    }
    if with_slug && let Some(slug) = meta.slug() {
        props.insert("mp-slug".into(), json!([slug]));
    }
    if let Some(head) = meta.extra_head() {
        props.insert("mp-extra-head".into(), json!([head]));
    }
    if let Some(body) = meta.extra_body() {
        props.insert("mp-extra-body".into(), json!([body]));
    }

    props
}
