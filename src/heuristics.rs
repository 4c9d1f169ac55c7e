// src/heuristics.rs

use regex::Regex;
use serde_json::{Map, Value};

/// Regex fallback for when no LLM backend is reachable: pull the
/// identifier fields straight out of the PDF text with keyword-anchored
/// patterns, keyed with the same labels the LLM extractor uses so the
/// resolver reads both alike.
pub fn extract_fields(text: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    put(
        &mut fields,
        "Invoice number",
        labeled_value(text, r"(?i)Invoice\s+(?:number|No\.?)\s*:?\s*([A-Za-z0-9\-/]+)"),
    );
    put(
        &mut fields,
        "Invoice date",
        labeled_value(
            text,
            r"(?i)Invoice\s+Date\s*:?\s*([A-Za-z]+\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4})",
        ),
    );
    put(
        &mut fields,
        "Declaration Number (DEC NO.)",
        labeled_value(
            text,
            // Bracket class tolerates the combined "Declaration Number (DEC NO.):" label.
            r"(?i)(?:Declaration\s+(?:Number|No\.?)|DEC\s+NO\.?)[\s():]*(\d[\d\-]*)",
        ),
    );
    put(
        &mut fields,
        "CRN No.",
        labeled_value(text, r"(?i)CRN\s+(?:No\.?|Number)\s*:?\s*([A-Za-z0-9\-]+)"),
    );
    put(
        &mut fields,
        "Bill Number",
        labeled_value(text, r"(?i)Bill\s+(?:Number|No\.?)\s*:?\s*([A-Za-z0-9\-/]+)"),
    );
    put(
        &mut fields,
        "Total weight",
        labeled_value(text, r"(?i)Total\s+weight\s*:?\s*([\d.,]+(?:\s*KGS?)?)"),
    );
    put(
        &mut fields,
        "Gross Weight",
        labeled_value(text, r"(?i)Gross\s+weight\s*:?\s*([\d.,]+(?:\s*KGS?)?)"),
    );
    put(
        &mut fields,
        "Container/Vehicle Number",
        labeled_value(
            text,
            r"(?i)Container\s*/?\s*Vehicle\s+(?:Number|No\.?)\s*:?\s*([A-Za-z0-9\-]+)",
        ),
    );
    fields
}

fn put(fields: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value));
    }
}

fn labeled_value(text: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text).map(|c| c[1].trim().to_string())
}
