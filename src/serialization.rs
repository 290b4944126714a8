/// JSON serialization of the AST.
///
/// The format is the serde representation of [`Document`]: every node is a
/// tagged object (`"type": "paragraph"` and so on) with its span inline.
/// Output is deterministic for a given document, so serialized trees can be
/// diffed and cached.
use crate::ast::Document;
use crate::error::{MarklyError, Result};

/// Serializes a document to compact JSON.
pub fn to_json(document: &Document) -> Result<String> {
    Ok(serde_json::to_string(document)?)
}

/// Serializes a document to human-readable JSON.
pub fn to_json_pretty(document: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Deserializes a document from JSON produced by [`to_json`].
pub fn from_json(json: &str) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(MarklyError::InvalidDocument {
            message: "root must be a document object".to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}
