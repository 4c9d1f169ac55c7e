// src/extract.rs

use crate::document::DocumentRecord;
use crate::heuristics;
use crate::llm::{self, LlmClient};
use crate::pdf::{self, PdfText};
use crate::store::DocumentStore;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

/// Cap on how much PDF text is sent to the model per document.
const MAX_PROMPT_CHARS: usize = 12_000;

/// Infer the document's role from its filename. `None` means the file is
/// not one of the four known document kinds. Order matters: the
/// certificate check runs before the generic "customs" check.
pub fn detect_document_type(filename: &str) -> Option<&'static str> {
    let name = filename.to_lowercase();
    if name.contains("leminar") || name.contains("invoice") {
        return Some("leminar_invoice");
    }
    if name.contains("waybill") || name.contains("western") || name.contains("consignment") {
        return Some("western_express");
    }
    if name.contains("customs-certificate") || name.contains("entryexit") {
        return Some("customs_certificate");
    }
    if name.contains("customs") || name.contains("declaration") {
        return Some("customs_declaration");
    }
    None
}

/// Extract every input PDF into a `DocumentRecord` and save it to the
/// store. Files the pipeline cannot handle (unknown type, scanned,
/// unparseable) are logged and skipped; the batch keeps going.
pub async fn batch_extract(
    files: &[PathBuf],
    forced_type: Option<&str>,
    llm: Option<&LlmClient>,
    store: &DocumentStore,
    with_embeddings: bool,
) -> Result<Vec<DocumentRecord>, Box<dyn std::error::Error>> {
    let mut records = Vec::new();

    for path in files {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let span = tracing::info_span!("extract", file = %filename);
        let _guard = span.enter();

        let Some(doc_type) = forced_type.or_else(|| detect_document_type(&filename)) else {
            warn!("Unrecognized document type — skipping");
            continue;
        };

        let pdf_bytes = fs::read(path)?;
        let text = match pdf::read_pdf_text(&pdf_bytes) {
            PdfText::Extracted(text) => text,
            PdfText::Scanned => {
                warn!("Scanned/image-only PDF — skipping (no OCR backend)");
                continue;
            }
            PdfText::Failed(e) => {
                tracing::error!(error = %e, "Failed to read PDF");
                continue;
            }
        };

        let mut fields = extract_fields(llm, doc_type, &text).await;
        info!(doc_type, fields = fields.len(), "Extraction result");

        let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
        fields.insert(
            "extraction_timestamp".to_string(),
            Value::String(timestamp),
        );
        fields.insert(
            "source_filename".to_string(),
            Value::String(filename.clone()),
        );

        let mut record = DocumentRecord::new(
            DocumentStore::generate_id(&filename, doc_type),
            doc_type,
            fields,
        );

        if with_embeddings {
            if let Some(llm) = llm {
                match llm.embed(&embedding_text(&record.fields)?).await {
                    Ok(embedding) => {
                        info!(dimensions = embedding.len(), "Embedded document");
                        record.embedding = Some(embedding);
                    }
                    Err(e) => {
                        warn!(error = %e, "Embedding failed — storing without similarity support");
                    }
                }
            }
        }

        store.save_document(&record)?;
        records.push(record);
    }

    Ok(records)
}

/// LLM extraction with the regex fallback when the model call fails or no
/// backend is configured.
async fn extract_fields(llm: Option<&LlmClient>, doc_type: &str, text: &str) -> Map<String, Value> {
    let Some(llm) = llm else {
        info!("No LLM backend — using regex extraction");
        return heuristics::extract_fields(text);
    };
    match llm_extract(llm, doc_type, text).await {
        Ok(fields) => fields,
        Err(e) => {
            warn!(error = %e, "LLM extraction failed — falling back to regex heuristics");
            heuristics::extract_fields(text)
        }
    }
}

async fn llm_extract(
    llm: &LlmClient,
    doc_type: &str,
    text: &str,
) -> Result<Map<String, Value>, llm::LlmError> {
    let text = truncate_chars(text, MAX_PROMPT_CHARS);
    let system = extraction_prompt(doc_type);
    let user = format!("Extract the document data from the following PDF text:\n\n{text}");

    let content = llm.chat(Some(&system), &user).await?;
    let json_str = llm::extract_json_object(&content)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| format!("Failed to parse LLM response as JSON: {e}\nRaw: {json_str}"))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(format!("Expected a JSON object from the model, got: {other}").into()),
    }
}

/// Truncation that never splits a UTF-8 code point.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The text that gets embedded: the field map minus the per-run metadata,
/// so re-extracting an unchanged document embeds identically.
fn embedding_text(fields: &Map<String, Value>) -> Result<String, serde_json::Error> {
    let filtered: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| {
            key.as_str() != "extraction_timestamp" && key.as_str() != "source_filename"
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    serde_json::to_string_pretty(&Value::Object(filtered))
}

/// System prompt instructing the model to emit a flat JSON object with
/// the field labels the resolver knows for this document kind.
fn extraction_prompt(doc_type: &str) -> String {
    let (kind, fields) = match doc_type {
        "leminar_invoice" => (
            "commercial invoice (HVAC equipment export)",
            r#"  "Invoice number" (string, e.g. "LACO-39"),
  "Invoice date" (string),
  "Date of export" (string),
  "Currency" (string, e.g. "AED"),
  "Declaration Number (DEC NO.)" (string),
  "CRN No." (string),
  "bill_number" (string),
  "Shipper/Exporter details" (object with "company_name", "address", "contact"),
  "Consignee details" (object with "company_name", "address"),
  "Total weight" (string, in KG),
  "Total amount" (string),
  "LAC reference numbers" (array of strings),
  "Total packages" (string)"#,
        ),
        "western_express" => (
            "consignment note / waybill",
            r#"  "CRN No." (string),
  "Consignment date" (string),
  "Shipper" (string),
  "Consignee" (string),
  "Origin" (string),
  "Destination" (string),
  "Number of packages" (string),
  "Total weight" (string, in KG)"#,
        ),
        "customs_certificate" => (
            "customs entry/exit certificate",
            r#"  "certificate_number" (string),
  "bill_number" (string),
  "invoice_date" (string),
  "container_vehicle_number" (string),
  "exporter_name" (string),
  "destination" (string)"#,
        ),
        "customs_declaration" => (
            "customs export declaration",
            r#"  "Declaration Number (DEC NO.)" (string),
  "Gross Weight" (string, in KG),
  "Net Weight" (string, in KG),
  "Consignee/Exporter" (string),
  "Number of packages" (string),
  "Port of loading" (string)"#,
        ),
        other => (other, r#"  any clearly labeled fields you can identify"#),
    };

    format!(
        r#"You are a trade-document data extraction assistant.
Given raw text extracted from a PDF {kind}, extract structured data and return ONLY valid JSON.

The JSON object must use exactly these keys:
{fields}

Notes:
- The text may be garbled due to PDF column extraction issues. Do your best to reconstruct the data.
- Use null for fields you cannot determine.
- Return ONLY the JSON object, no markdown fences, no commentary."#
    )
}
