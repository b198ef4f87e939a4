//! Statement Data Structure
//!
//! This module defines `Statement` - the domain record the vocabulary jobs
//! produce and the writer appends to the stream.
//!
//! ## What is a Statement?
//! A statement is a subject/predicate/object assertion extracted from one
//! source record, e.g. "bib b10011745 has identifier urn:bnum:10011745".
//!
//! ## Structure
//! - **subject_id**: The entity the statement is about (also the default partition key source)
//! - **predicate**: The relationship, as a prefixed name (`dcterms:identifier`)
//! - **object_id / object_literal**: The value, either a resource id or a literal
//! - **source_\***: Where the statement was extracted from
//! - **creator_id / index**: Which job produced it and its position among siblings
//!
//! ## Example
//! ```ignore
//! let statement = Statement::new("b10011745", "dcterms:identifier", 10004, "10011745")
//!     .with_object_id("urn:bnum:10011745")
//!     .with_source_record_path("id");
//! ```

use serde::{Deserialize, Serialize};

/// A single subject/predicate/object statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Identifier of the subject entity
    pub subject_id: String,

    /// Predicate as a prefixed name
    pub predicate: String,

    /// Numeric id of the source system
    pub source_id: i64,

    /// Identifier of the record within the source system
    pub source_record_id: String,

    /// Id of the job or agent that created the statement
    pub creator_id: i64,

    /// Position among statements sharing subject and predicate
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_literal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_label: Option<String>,

    /// Path inside the source record the value was read from
    pub source_record_path: String,
}

impl Statement {
    pub fn new(
        subject_id: impl Into<String>,
        predicate: impl Into<String>,
        source_id: i64,
        source_record_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            predicate: predicate.into(),
            source_id,
            source_record_id: source_record_id.into(),
            creator_id: 1,
            index: 0,
            object_id: None,
            object_literal: None,
            object_type: None,
            object_label: None,
            source_record_path: String::new(),
        }
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_object_literal(mut self, literal: impl Into<String>) -> Self {
        self.object_literal = Some(literal.into());
        self
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_object_label(mut self, label: impl Into<String>) -> Self {
        self.object_label = Some(label.into());
        self
    }

    pub fn with_creator(mut self, creator_id: i64) -> Self {
        self.creator_id = creator_id;
        self
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn with_source_record_path(mut self, path: impl Into<String>) -> Self {
        self.source_record_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let statement = Statement::new("b10011745", "dcterms:identifier", 10004, "10011745")
            .with_object_id("urn:bnum:10011745");
        let json = serde_json::to_string(&statement).unwrap();

        assert!(json.contains(r#""object_id":"urn:bnum:10011745""#));
        assert!(!json.contains("object_literal"));
        assert!(!json.contains("object_label"));
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let json = r#"{
            "subject_id": "b10011745",
            "predicate": "dcterms:identifier",
            "source_id": 10004,
            "source_record_id": "10011745",
            "creator_id": 1,
            "index": 0,
            "source_record_path": "id"
        }"#;
        let statement: Statement = serde_json::from_str(json).unwrap();

        assert_eq!(statement.subject_id, "b10011745");
        assert_eq!(statement.object_id, None);
        assert_eq!(statement.source_record_path, "id");
    }
}
