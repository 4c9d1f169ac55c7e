// src/search.rs

use crate::document::DocumentRecord;
use crate::fields::{self, Attr};
use crate::store::DocumentStore;
use rusqlite::Result as SqliteResult;
use serde_json::{Map, Value};
use tracing::warn;

/// Top-k stored documents by cosine similarity to `query`.
///
/// Retrieval augmentation is best-effort: any storage failure is logged
/// and reported as "no similar documents" instead of aborting the run.
pub fn search_similar(
    store: &DocumentStore,
    query: &[f64],
    top_k: usize,
) -> Vec<Map<String, Value>> {
    match ranked_candidates(store, query, top_k) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "Vector search failed — continuing without similarity context");
            Vec::new()
        }
    }
}

fn ranked_candidates(
    store: &DocumentStore,
    query: &[f64],
    top_k: usize,
) -> SqliteResult<Vec<Map<String, Value>>> {
    let docs = store.get_documents(None)?;

    let mut scored: Vec<(f64, &DocumentRecord)> = docs
        .iter()
        .filter_map(|doc| {
            let embedding = doc.embedding.as_ref()?;
            cosine_similarity(query, embedding).map(|score| (score, doc))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|(score, doc)| candidate(score, doc))
        .collect())
}

/// Compact projection of a candidate for the report context: identifiers
/// plus the similarity score, never the embedding itself.
fn candidate(score: f64, doc: &DocumentRecord) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("id".to_string(), Value::String(doc.id.clone()));
    entry.insert(
        "document_type".to_string(),
        Value::String(doc.doc_type.clone()),
    );
    if let Some(number) = fields::resolve_present(&doc.fields, Attr::InvoiceNumber) {
        entry.insert("invoice_number".to_string(), number.clone());
    }
    if let Some(date) = fields::resolve_present(&doc.fields, Attr::InvoiceDate) {
        entry.insert("invoice_date".to_string(), date.clone());
    }
    entry.insert("score".to_string(), Value::from(score));
    entry
}

/// None when dimensions differ or either vector has zero magnitude.
fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn embedded_doc(id: &str, embedding: Vec<f64>) -> DocumentRecord {
        let mut doc = DocumentRecord::new(
            id,
            "leminar_invoice",
            json!({ "Invoice number": id }).as_object().unwrap().clone(),
        );
        doc.embedding = Some(embedding);
        doc
    }

    #[test]
    fn cosine_prefers_aligned_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() > 0.99);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap() < 0.01);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn returns_top_k_most_similar_with_scores() {
        let store = DocumentStore::new(":memory:").unwrap();
        store
            .save_document(&embedded_doc("near", vec![1.0, 0.05]))
            .unwrap();
        store
            .save_document(&embedded_doc("far", vec![0.0, 1.0]))
            .unwrap();
        store
            .save_document(&embedded_doc("nearest", vec![1.0, 0.0]))
            .unwrap();
        // No embedding — must be skipped, not scored.
        store
            .save_document(&DocumentRecord::new(
                "plain",
                "customs_declaration",
                Map::new(),
            ))
            .unwrap();

        let results = search_similar(&store, &[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["id"], json!("nearest"));
        assert_eq!(results[1]["id"], json!("near"));
        assert!(results[0]["score"].as_f64().unwrap() > results[1]["score"].as_f64().unwrap());
        assert_eq!(results[0]["invoice_number"], json!("nearest"));
        assert!(!results[0].contains_key("embedding"));
    }

    #[test]
    fn dimension_mismatch_yields_no_candidates() {
        let store = DocumentStore::new(":memory:").unwrap();
        store
            .save_document(&embedded_doc("a", vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert!(search_similar(&store, &[1.0, 0.0], 3).is_empty());
    }
}
