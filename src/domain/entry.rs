//! Post entries as edited locally and as returned by the publishing endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Metadata edited alongside an entry's content.
///
/// Every field is optional; [`EntryMeta::name`] and friends only report values that
/// are worth sending, so callers never have to repeat the emptiness rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntryMeta {
    #[serde(default, deserialize_with = "optional_scalar")]
    pub name: Option<String>,
    #[serde(rename = "mp-slug", default, deserialize_with = "optional_scalar")]
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub category: Vec<String>,
    #[serde(rename = "mp-extra-head", default, deserialize_with = "optional_scalar")]
    pub extra_head: Option<String>,
    #[serde(rename = "mp-extra-body", default, deserialize_with = "optional_scalar")]
    pub extra_body: Option<String>,
}

impl EntryMeta {
    pub fn name(&self) -> Option<&str> {
        present(self.name.as_deref())
    }

    pub fn slug(&self) -> Option<&str> {
        present(self.slug.as_deref())
    }

    pub fn extra_head(&self) -> Option<&str> {
        present(self.extra_head.as_deref())
    }

    pub fn extra_body(&self) -> Option<&str> {
        present(self.extra_body.as_deref())
    }

    /// Categories with blank entries removed, in their original order.
    pub fn categories(&self) -> Vec<&str> {
        self.category
            .iter()
            .filter_map(|value| present(Some(value.as_str())))
            .collect()
    }

    /// Normalised copy: blank fields become `None`, blank categories are dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name().map(str::to_string),
            slug: self.slug().map(str::to_string),
            category: self.categories().into_iter().map(str::to_string).collect(),
            extra_head: self.extra_head().map(str::to_string),
            extra_body: self.extra_body().map(str::to_string),
        }
    }
}

/// A unit of content about to be sent to the publishing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub content: String,
    pub meta: EntryMeta,
}

impl Entry {
    pub fn new(content: impl Into<String>, meta: EntryMeta) -> Self {
        Self {
            content: content.into(),
            meta,
        }
    }
}

/// Source of an existing post as returned by `q=source`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub kind: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl SourceRecord {
    /// All values stored under `key`. A bare value is treated as a one-element list.
    pub fn values(&self, key: &str) -> Vec<&Value> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        }
    }

    pub fn first_text(&self, key: &str) -> Option<String> {
        self.values(key).into_iter().find_map(value_text)
    }

    pub fn categories(&self) -> Vec<String> {
        self.values("category")
            .into_iter()
            .filter_map(value_text)
            .collect()
    }

    /// Editable content: plain strings as-is, otherwise the `value` or `html` member.
    pub fn content(&self) -> String {
        let Some(first) = self.values("content").into_iter().next() else {
            return String::new();
        };
        match first {
            Value::Object(map) => map
                .get("value")
                .or_else(|| map.get("html"))
                .and_then(value_text)
                .unwrap_or_default(),
            other => value_text(other).unwrap_or_default(),
        }
    }

    pub fn to_meta(&self) -> EntryMeta {
        EntryMeta {
            name: self.first_text("name"),
            slug: self.first_text("mp-slug"),
            category: self.categories(),
            extra_head: self.first_text("mp-extra-head"),
            extra_body: self.first_text("mp-extra-body"),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Header scalars may be written without quotes, so `name: 2024` must still be text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(text) => text,
            Scalar::Int(value) => value.to_string(),
            Scalar::Unsigned(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Bool(value) => value.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarOrList {
    List(Vec<Option<Scalar>>),
    One(Scalar),
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
}

fn scalar_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<ScalarOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ScalarOrList::One(value)) => vec![value.into_text()],
        Some(ScalarOrList::List(items)) => items
            .into_iter()
            .flatten()
            .map(Scalar::into_text)
            .collect(),
    };
    Ok(values)
}
