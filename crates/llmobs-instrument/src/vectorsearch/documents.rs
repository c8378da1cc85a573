//! Reduction of raw search results to retrieval-span documents.
//!
//! Vector stores return loosely structured records. Each record is mapped to
//! a `Document` by looking up well-known fields in priority order:
//!
//! - `name`: `name`, `metadata.name`, `metadata.title`, `metadata.filename`,
//!   `metadata.url`, `metadata.id`
//! - `text`: `content`, `document`, `input`, `payload`, `data.content`,
//!   `metadata.content`, else the whole record as JSON minus vectors and the
//!   fields reported separately
//!
//! `score` and `id` are passed through unchanged. Null values count as
//! absent.

use llmobs_span::Document;
use serde_json::{Map, Value};

/// Fields that hold embedding vectors.
pub const VECTOR_ATTRIBUTES: [&str; 4] = ["embedding", "vector", "input_vector", "values"];

const NAME_PATHS: [&[&str]; 6] = [
    &["name"],
    &["metadata", "name"],
    &["metadata", "title"],
    &["metadata", "filename"],
    &["metadata", "url"],
    &["metadata", "id"],
];

const TEXT_PATHS: [&[&str]; 6] = [
    &["content"],
    &["document"],
    &["input"],
    &["payload"],
    &["data", "content"],
    &["metadata", "content"],
];

const REPORTED_FIELDS: [&str; 3] = ["name", "score", "id"];

fn lookup<'a>(record: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut value = record.get(*first)?;
    for key in rest {
        value = value.as_object()?.get(*key)?;
    }
    (!value.is_null()).then_some(value)
}

fn first_present<'a>(record: &'a Map<String, Value>, paths: &[&[&str]]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(record, path))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn stripped_json(record: &Map<String, Value>) -> String {
    let rest: Map<String, Value> = record
        .iter()
        .filter(|(key, _)| {
            !VECTOR_ATTRIBUTES.contains(&key.as_str()) && !REPORTED_FIELDS.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(rest).to_string()
}

/// Map one search result to a document.
pub fn to_document(result: &Value) -> Document {
    let Some(record) = result.as_object() else {
        return Document {
            text: Some(render(result)),
            ..Default::default()
        };
    };

    let text = first_present(record, &TEXT_PATHS)
        .map(render)
        .unwrap_or_else(|| stripped_json(record));

    Document {
        text: Some(text),
        name: first_present(record, &NAME_PATHS).map(render),
        score: lookup(record, &["score"]).cloned(),
        id: lookup(record, &["id"]).cloned(),
    }
}

pub fn to_documents(results: &[Value]) -> Vec<Document> {
    results.iter().map(to_document).collect()
}

/// Text of a search result, as used to build an answer context.
pub fn document_text(result: &Value) -> String {
    to_document(result).text.unwrap_or_default()
}
