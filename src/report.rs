// src/report.rs

use crate::linking::LinkedDocuments;
use crate::llm::ReportGenerator;
use crate::rules::Verdict;
use crate::search;
use crate::store::DocumentStore;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;

/// Plain-language description of the rule set, handed to the report
/// generator alongside the deterministic verdicts.
pub const USER_RULES: &str = "\
Match the invoice to its customs declaration and consignment note using the respective reference fields.
Ensure the invoice date is on or after the customs certificate date.
Check total weight matches across all documents.
Check exporter name consistency.
Check vehicle/container numbers match.
Generate a compliance report with pass/fail for each rule and explanations.
Additionally, use any similar or related documents retrieved by vector search to inform your reasoning and catch edge cases or fuzzy matches.
";

const REPORT_TEMPLATE: &str = r#"
You are a compliance officer. Given these compliance rules:
{rules}

And these linked business documents in JSON:
{documents}

Here are the results of deterministic (programmatic) validation for each rule:
{deterministic_results}

For each rule, output a checklist with pass/fail and a concise explanation, using the deterministic results as your primary guide. If the deterministic result is ambiguous or missing, use your own reasoning. At the end, summarize the overall compliance status in the style:

Invoice_INV1001 – Compliance Report

✅ PO Matched: PO505
✅ GRN Matched: GRN802
❌ Quantity Mismatch: Item B (Invoice: 3 > GRN: 2)
❌ Unit Price Mismatch: Item B ($25 vs $20 in PO)
✅ Total Amount Within Tolerance
✅ Invoice Date ≥ GRN Date
✅ Vendor Approved (TechSupply Inc.)

Final Status: FAIL (2 issues found)
"#;

const RAG_REPORT_TEMPLATE: &str = r#"
You are a compliance officer. Given these compliance rules:
{rules}

And these linked business documents in JSON:
{documents}

Here are the results of deterministic (programmatic) validation for each rule:
{deterministic_results}

Here are additional similar or related documents retrieved by vector search for each main document:
{rag_context}

For each rule, output a checklist with pass/fail and a concise explanation, using the deterministic results and retrieved context as your primary guide. If the deterministic result is ambiguous or missing, use your own reasoning. At the end, summarize the overall compliance status in the style:

Invoice_INV1001 – Compliance Report

✅ PO Matched: PO505
✅ GRN Matched: GRN802
❌ Quantity Mismatch: Item B (Invoice: 3 > GRN: 2)
❌ Unit Price Mismatch: Item B ($25 vs $20 in PO)
✅ Total Amount Within Tolerance
✅ Invoice Date ≥ GRN Date
✅ Vendor Approved (TechSupply Inc.)

Final Status: FAIL (2 issues found)
"#;

/// JSON view of the linked set: each slot's full field mapping, or an
/// explicit null for an absent slot.
pub fn linked_documents_json(links: &LinkedDocuments) -> Value {
    let mut out = Map::new();
    for (name, slot) in links.slots() {
        let value = match slot {
            Some(doc) => Value::Object(doc.fields.clone()),
            None => Value::Null,
        };
        out.insert(name.to_string(), value);
    }
    Value::Object(out)
}

/// Assemble the deterministic generator context: the rule-set description,
/// the serialized linked documents, and the serialized verdicts.
pub fn build_report_context(
    links: &LinkedDocuments,
    results: &[Verdict],
) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let mut context = HashMap::new();
    context.insert("rules".to_string(), USER_RULES.to_string());
    context.insert(
        "documents".to_string(),
        serde_json::to_string_pretty(&linked_documents_json(links))?,
    );
    context.insert(
        "deterministic_results".to_string(),
        serde_json::to_string_pretty(results)?,
    );
    Ok(context)
}

/// Baseline compliance report: deterministic context only.
pub async fn generate_compliance_report(
    llm: &dyn ReportGenerator,
    links: &LinkedDocuments,
    results: &[Verdict],
) -> Result<String, Box<dyn std::error::Error>> {
    let context = build_report_context(links, results)?;
    Ok(llm.generate_report(REPORT_TEMPLATE, &context).await?)
}

/// Retrieval-augmented report: for every slot that is present and carries
/// an embedding, pull the nearest stored documents into the context.
/// Retrieval is best-effort — a slot with no candidates simply contributes
/// an empty list.
pub async fn generate_rag_compliance_report(
    llm: &dyn ReportGenerator,
    store: &DocumentStore,
    top_k: usize,
    links: &LinkedDocuments,
    results: &[Verdict],
) -> Result<String, Box<dyn std::error::Error>> {
    let mut rag_context = Map::new();
    for (name, slot) in links.slots() {
        let Some(doc) = slot else { continue };
        let Some(embedding) = &doc.embedding else { continue };
        let similar = search::search_similar(store, embedding, top_k);
        info!(slot = name, candidates = similar.len(), "Similarity context");
        rag_context.insert(
            name.to_string(),
            Value::Array(similar.into_iter().map(Value::Object).collect()),
        );
    }

    let mut context = build_report_context(links, results)?;
    context.insert(
        "rag_context".to_string(),
        serde_json::to_string_pretty(&Value::Object(rag_context))?,
    );
    Ok(llm.generate_report(RAG_REPORT_TEMPLATE, &context).await?)
}
