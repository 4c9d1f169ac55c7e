use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One extracted document: a loosely typed key/value bag plus metadata.
///
/// `doc_type` is whatever tag extraction produced (e.g. "leminar_invoice",
/// "customs_declaration"); linking never trusts it — documents are matched
/// by identifier, not by type. `fields` keys are extractor-dependent
/// natural-language labels, so any logical attribute may be missing or
/// spelled differently from one extractor to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub doc_type: String,
    pub fields: Map<String, Value>,
    pub embedding: Option<Vec<f64>>,
}

impl DocumentRecord {
    pub fn new(
        id: impl Into<String>,
        doc_type: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            fields,
            embedding: None,
        }
    }
}
