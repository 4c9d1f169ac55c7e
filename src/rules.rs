// src/rules.rs

use crate::fields::{self, Attr};
use crate::linking::LinkedDocuments;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of one deterministic check. Serializes the rule name under
/// `label`, the shape the report generator consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    #[serde(rename = "label")]
    pub rule_name: String,
    pub passed: bool,
    pub explanation: String,
}

/// A named deterministic check over the linked set.
pub struct Rule {
    pub name: &'static str,
    pub check: fn(&LinkedDocuments) -> (bool, String),
}

/// The rule battery. This array is the single source of rule order;
/// verdicts come back in exactly this order, one per rule, always.
pub const RULES: [Rule; 6] = [
    Rule {
        name: "DEC Matched",
        check: check_declaration_link,
    },
    Rule {
        name: "CRN No. Matched",
        check: check_waybill_link,
    },
    Rule {
        name: "Total Weight Match",
        check: check_total_weight,
    },
    Rule {
        name: "Exporter Name Consistency",
        check: check_exporter_name,
    },
    Rule {
        name: "Vehicle/Container Number Match",
        check: check_vehicle_number,
    },
    Rule {
        name: "Invoice Date vs Certificate",
        check: check_invoice_date_vs_certificate,
    },
];

/// Run every rule against the linked set. Missing documents or fields are
/// ordinary failures with an explanation, never an error.
pub fn run_deterministic_checks(links: &LinkedDocuments) -> Vec<Verdict> {
    RULES
        .iter()
        .map(|rule| {
            let (passed, explanation) = (rule.check)(links);
            Verdict {
                rule_name: rule.name.to_string(),
                passed,
                explanation,
            }
        })
        .collect()
}

fn check_declaration_link(links: &LinkedDocuments) -> (bool, String) {
    match (&links.invoice, &links.customs_declaration) {
        (Some(_), Some(declaration)) => {
            let dec_no = fields::resolve(&declaration.fields, Attr::DeclarationNumber)
                .map(fields::display)
                .unwrap_or_default();
            (true, format!("DEC Matched: {dec_no}"))
        }
        _ => (false, "DEC not matched.".to_string()),
    }
}

fn check_waybill_link(links: &LinkedDocuments) -> (bool, String) {
    match (&links.invoice, &links.waybill) {
        (Some(_), Some(waybill)) => {
            let crn_no = fields::resolve(&waybill.fields, Attr::CrnNumber)
                .map(fields::display)
                .unwrap_or_default();
            (true, format!("CRN No. Matched: {crn_no}"))
        }
        _ => (false, "CRN No. not matched.".to_string()),
    }
}

fn check_total_weight(links: &LinkedDocuments) -> (bool, String) {
    let invoice_weight = links
        .invoice
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::TotalWeight));
    let customs_weight = links
        .customs_declaration
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::GrossWeight));

    match (invoice_weight, customs_weight) {
        (Some(invoice_weight), Some(customs_weight)) => {
            if fields::normalize(Some(invoice_weight)) == fields::normalize(Some(customs_weight)) {
                (
                    true,
                    format!("Total Weight Matches ({})", fields::display(invoice_weight)),
                )
            } else {
                (
                    false,
                    format!(
                        "Weight Mismatch: Invoice: {}, Customs: {}",
                        fields::display(invoice_weight),
                        fields::display(customs_weight)
                    ),
                )
            }
        }
        _ => (false, "Weight data missing in one or more documents.".to_string()),
    }
}

/// Containment, not equality: the invoice usually carries the short
/// trading name while the declaration spells out the full legal entity.
fn check_exporter_name(links: &LinkedDocuments) -> (bool, String) {
    let invoice_exporter = links
        .invoice
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::ExporterName));
    let customs_exporter = links
        .customs_declaration
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::ConsigneeExporter));

    match (invoice_exporter, customs_exporter) {
        (Some(invoice_exporter), Some(customs_exporter)) => {
            let needle = fields::normalize(Some(invoice_exporter));
            if fields::normalize(Some(customs_exporter)).contains(&needle) {
                (true, "Exporter Name Consistent".to_string())
            } else {
                (
                    false,
                    format!(
                        "Exporter Name Mismatch: Invoice: {}, Customs: {}",
                        fields::display(invoice_exporter),
                        fields::display(customs_exporter)
                    ),
                )
            }
        }
        _ => (false, "Exporter name missing in one or more documents.".to_string()),
    }
}

fn check_vehicle_number(links: &LinkedDocuments) -> (bool, String) {
    let invoice_vehicle = links
        .invoice
        .as_ref()
        .and_then(|doc| vehicle_reference(&doc.fields));
    let customs_vehicle = links
        .customs_certificate
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::ContainerVehicleNumber));

    match (invoice_vehicle, customs_vehicle) {
        (Some(invoice_vehicle), Some(customs_vehicle)) => {
            if fields::normalize(Some(invoice_vehicle)) == fields::normalize(Some(customs_vehicle))
            {
                (
                    true,
                    format!(
                        "Vehicle/Container Number Matches ({})",
                        fields::display(invoice_vehicle)
                    ),
                )
            } else {
                (
                    false,
                    format!(
                        "Vehicle/Container Number Mismatch: Invoice: {}, Certificate: {}",
                        fields::display(invoice_vehicle),
                        fields::display(customs_vehicle)
                    ),
                )
            }
        }
        _ => (
            false,
            "Vehicle/container number missing in one or more documents.".to_string(),
        ),
    }
}

/// The vehicle reference is the last entry of the invoice's reference
/// list that mentions DXB. A non-list value reads as absent.
fn vehicle_reference(fields_map: &Map<String, Value>) -> Option<&Value> {
    let refs = fields::resolve(fields_map, Attr::ReferenceNumbers)?.as_array()?;
    refs.iter()
        .filter(|entry| entry.as_str().is_some_and(|s| s.contains("DXB")))
        .next_back()
}

fn check_invoice_date_vs_certificate(links: &LinkedDocuments) -> (bool, String) {
    let invoice_date = links
        .invoice
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::InvoiceDate))
        .map(fields::display);
    let cert_date = links
        .customs_certificate
        .as_ref()
        .and_then(|doc| fields::resolve_present(&doc.fields, Attr::CertificateDate))
        .map(fields::display);

    match (invoice_date, cert_date) {
        (Some(invoice_date), Some(cert_date)) => {
            // Raw string comparison, no date parsing. Correct for ISO-style
            // dates; a known limitation for anything else.
            if invoice_date >= cert_date {
                (true, "Invoice Date ≥ Customs Certificate Date".to_string())
            } else {
                (
                    false,
                    format!("Invoice Date {invoice_date} < Certificate Date {cert_date}"),
                )
            }
        }
        _ => (false, "Invoice or certificate date missing.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentRecord;
    use crate::linking::link_documents;
    use serde_json::json;

    fn record(id: &str, doc_type: &str, fields: serde_json::Value) -> DocumentRecord {
        DocumentRecord::new(id, doc_type, fields.as_object().expect("object").clone())
    }

    fn verdict<'a>(results: &'a [Verdict], name: &str) -> &'a Verdict {
        results
            .iter()
            .find(|v| v.rule_name == name)
            .unwrap_or_else(|| panic!("no verdict for {name}"))
    }

    #[test]
    fn always_six_verdicts_in_declared_order() {
        let results = run_deterministic_checks(&LinkedDocuments::default());
        let names: Vec<&str> = results.iter().map(|v| v.rule_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "DEC Matched",
                "CRN No. Matched",
                "Total Weight Match",
                "Exporter Name Consistency",
                "Vehicle/Container Number Match",
                "Invoice Date vs Certificate",
            ]
        );
    }

    #[test]
    fn empty_links_fail_every_rule_without_panicking() {
        let results = run_deterministic_checks(&LinkedDocuments::default());
        assert_eq!(results.len(), 6);
        for v in &results {
            assert!(!v.passed, "{} unexpectedly passed", v.rule_name);
            assert!(!v.explanation.is_empty());
        }
        assert_eq!(verdict(&results, "DEC Matched").explanation, "DEC not matched.");
        assert_eq!(
            verdict(&results, "CRN No. Matched").explanation,
            "CRN No. not matched."
        );
    }

    #[test]
    fn full_match_scenario_passes_dec_and_weight() {
        let docs = vec![
            record(
                "inv.pdf",
                "leminar_invoice",
                json!({
                    "Invoice number": "LACO-39",
                    "Declaration Number (DEC NO.)": "203-04144376-23",
                    "Total weight": "500",
                }),
            ),
            record(
                "dec.pdf",
                "customs_declaration",
                json!({
                    "Declaration Number (DEC NO.)": "203-04144376-23",
                    "Gross Weight": "500",
                }),
            ),
        ];
        let links = link_documents(&docs);
        let results = run_deterministic_checks(&links);

        let dec = verdict(&results, "DEC Matched");
        assert!(dec.passed);
        assert!(dec.explanation.contains("203-04144376-23"));

        let weight = verdict(&results, "Total Weight Match");
        assert!(weight.passed);
        assert!(weight.explanation.contains("500"));
    }

    #[test]
    fn weight_unit_suffix_is_a_mismatch_with_both_values_reported() {
        // Normalization strips whitespace, hyphens and case only; "500" and
        // "500 KG" stay different identifiers.
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({ "Invoice number": "LACO-39", "Total weight": "500" }),
            )),
            customs_declaration: Some(record(
                "dec.pdf",
                "customs_declaration",
                json!({ "Gross Weight": "500 KG" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let weight = verdict(&results, "Total Weight Match");
        assert!(!weight.passed);
        assert!(weight.explanation.contains("500"));
        assert!(weight.explanation.contains("500 KG"));
    }

    #[test]
    fn numeric_and_string_weights_compare_equal_after_coercion() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({ "Invoice number": "LACO-39", "Total weight": 500 }),
            )),
            customs_declaration: Some(record(
                "dec.pdf",
                "customs_declaration",
                json!({ "gross_weight": "500" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        assert!(verdict(&results, "Total Weight Match").passed);
    }

    #[test]
    fn exporter_substring_counts_as_consistent() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({
                    "Invoice number": "LACO-39",
                    "Shipper/Exporter details": { "company_name": "Leminar" },
                }),
            )),
            customs_declaration: Some(record(
                "dec.pdf",
                "customs_declaration",
                json!({ "Consignee/Exporter": "Leminar Air Conditioning Co LLC" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let exporter = verdict(&results, "Exporter Name Consistency");
        assert!(exporter.passed);
        assert_eq!(exporter.explanation, "Exporter Name Consistent");
    }

    #[test]
    fn exporter_mismatch_reports_both_names() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({
                    "Invoice number": "LACO-39",
                    "Shipper/Exporter details": { "company_name": "Acme Trading" },
                }),
            )),
            customs_declaration: Some(record(
                "dec.pdf",
                "customs_declaration",
                json!({ "Consignee/Exporter": "Leminar Air Conditioning Co LLC" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let exporter = verdict(&results, "Exporter Name Consistency");
        assert!(!exporter.passed);
        assert!(exporter.explanation.contains("Acme Trading"));
        assert!(exporter.explanation.contains("Leminar Air Conditioning Co LLC"));
    }

    #[test]
    fn vehicle_number_matches_last_dxb_reference() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({
                    "Invoice number": "LACO-39",
                    "LAC reference numbers": ["REF-1", "DXB-100", "DXB-200"],
                }),
            )),
            customs_certificate: Some(record(
                "cert.pdf",
                "customs_certificate",
                json!({ "container_vehicle_number": "DXB 200" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let vehicle = verdict(&results, "Vehicle/Container Number Match");
        assert!(vehicle.passed);
        assert!(vehicle.explanation.contains("DXB-200"));
    }

    #[test]
    fn non_list_reference_numbers_degrade_to_missing() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({ "Invoice number": "LACO-39", "LAC reference numbers": "DXB-100" }),
            )),
            customs_certificate: Some(record(
                "cert.pdf",
                "customs_certificate",
                json!({ "container_vehicle_number": "DXB-100" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let vehicle = verdict(&results, "Vehicle/Container Number Match");
        assert!(!vehicle.passed);
        assert!(vehicle.explanation.contains("missing"));
    }

    #[test]
    fn invoice_date_on_or_after_certificate_date_passes() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({ "Invoice number": "LACO-39", "Invoice date": "2023-06-15" }),
            )),
            customs_certificate: Some(record(
                "cert.pdf",
                "customs_certificate",
                json!({ "invoice_date": "2023-06-10" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        assert!(verdict(&results, "Invoice Date vs Certificate").passed);
    }

    #[test]
    fn invoice_date_before_certificate_date_fails_with_both_dates() {
        let links = LinkedDocuments {
            invoice: Some(record(
                "inv.pdf",
                "leminar_invoice",
                json!({ "Invoice number": "LACO-39", "Invoice date": "2023-06-01" }),
            )),
            customs_certificate: Some(record(
                "cert.pdf",
                "customs_certificate",
                json!({ "invoice_date": "2023-06-10" }),
            )),
            ..Default::default()
        };
        let results = run_deterministic_checks(&links);
        let date = verdict(&results, "Invoice Date vs Certificate");
        assert!(!date.passed);
        assert!(date.explanation.contains("2023-06-01"));
        assert!(date.explanation.contains("2023-06-10"));
    }
}
