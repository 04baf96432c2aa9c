//! The text buffer handed to the editor: a YAML header, a `---` line, then the content.

use serde::Serialize;

use super::EditError;
use crate::domain::entry::{Entry, EntryMeta, SourceRecord};

pub const DELIMITER: &str = "---";

const TEMPLATE: &str = "name:\nmp-slug:\ncategory: []\nmp-extra-head: |\nmp-extra-body: |\n---\n";

#[derive(Serialize)]
struct Header<'a> {
    name: Option<&'a str>,
    #[serde(rename = "mp-slug")]
    slug: Option<&'a str>,
    category: &'a [String],
    #[serde(rename = "mp-extra-head")]
    extra_head: &'a str,
    #[serde(rename = "mp-extra-body")]
    extra_body: &'a str,
}

/// Empty buffer for a new post.
pub fn render_template() -> String {
    TEMPLATE.to_string()
}

/// Buffer for editing an existing post.
pub fn render_source(record: &SourceRecord) -> Result<String, EditError> {
    let meta = record.to_meta();
    let header = Header {
        name: meta.name.as_deref(),
        slug: meta.slug.as_deref(),
        category: &meta.category,
        extra_head: meta.extra_head.as_deref().unwrap_or_default(),
        extra_body: meta.extra_body.as_deref().unwrap_or_default(),
    };

    let mut buffer = serde_yaml::to_string(&header)?;
    if !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    buffer.push_str(DELIMITER);
    buffer.push('\n');
    buffer.push_str(&record.content());
    Ok(buffer)
}

/// Split an edited buffer back into metadata and content.
pub fn parse(buffer: &str) -> Result<Entry, EditError> {
    let (header, body) = split(buffer).ok_or(EditError::MissingDelimiter)?;

    let meta = if header.trim().is_empty() {
        EntryMeta::default()
    } else {
        serde_yaml::from_str::<EntryMeta>(header)?
    };

    Ok(Entry::new(
        body.trim_end_matches(['\n', '\r']),
        meta.normalized(),
    ))
}

/// Header and body around the first line that is exactly the delimiter.
fn split(buffer: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in buffer.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == DELIMITER {
            return Some((&buffer[..offset], &buffer[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}
