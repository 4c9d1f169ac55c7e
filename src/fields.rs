// src/fields.rs

use serde_json::{Map, Value};

/// Logical attributes read across documents.
///
/// Extractors disagree on key spelling, so each attribute carries an
/// ordered synonym list; the first key present in a document wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    InvoiceNumber,
    DeclarationNumber,
    CrnNumber,
    BillNumber,
    TotalWeight,
    GrossWeight,
    ExporterName,
    ConsigneeExporter,
    ContainerVehicleNumber,
    InvoiceDate,
    CertificateDate,
    ReferenceNumbers,
}

/// Invoice key whose object value holds the exporter's company name.
const SHIPPER_DETAILS: &str = "Shipper/Exporter details";

impl Attr {
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Attr::InvoiceNumber => &["Invoice number", "invoice_number", "Invoice No."],
            Attr::DeclarationNumber => &[
                "Declaration Number (DEC NO.)",
                "declaration_number",
                "DEC NO.",
                "Declaration No.",
            ],
            Attr::CrnNumber => &["CRN No.", "crn_no", "CRN Number"],
            Attr::BillNumber => &["bill_number", "Bill Number", "Bill No."],
            Attr::TotalWeight => &["Total weight", "total_weight"],
            Attr::GrossWeight => &["Gross Weight", "gross_weight"],
            Attr::ExporterName => &["company_name", "Company Name"],
            Attr::ConsigneeExporter => &["Consignee/Exporter", "consignee_exporter"],
            Attr::ContainerVehicleNumber => {
                &["container_vehicle_number", "Container/Vehicle Number"]
            }
            // Certificates label their issue date with the invoice-date
            // keys, snake_case variant first.
            Attr::CertificateDate => &["invoice_date", "Invoice date"],
            Attr::InvoiceDate => &["Invoice date", "invoice_date"],
            Attr::ReferenceNumbers => &["LAC reference numbers"],
        }
    }
}

/// Return the value of the first key present in `fields`, if any.
/// Presence is what counts — a key mapped to null still wins over a
/// later synonym that carries a value.
pub fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| fields.get(*key))
}

/// Resolve a logical attribute against a document's field mapping.
///
/// `ExporterName` lives one level down, inside the invoice's
/// shipper/exporter object; a non-object value there reads as absent.
pub fn resolve<'a>(fields: &'a Map<String, Value>, attr: Attr) -> Option<&'a Value> {
    match attr {
        Attr::ExporterName => {
            let details = fields.get(SHIPPER_DETAILS)?.as_object()?;
            first_present(details, attr.synonyms())
        }
        _ => first_present(fields, attr.synonyms()),
    }
}

/// Resolve an attribute and keep it only if it actually carries a value
/// (nulls and empty strings count as missing).
pub fn resolve_present<'a>(fields: &'a Map<String, Value>, attr: Attr) -> Option<&'a Value> {
    resolve(fields, attr).filter(|value| has_value(value))
}

/// Whether a raw field value counts as present for rule evaluation.
pub fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Canonical comparison form: stringified, whitespace and hyphens removed,
/// lower-cased. Idempotent; absent values normalize to "".
///
/// Stringification is deliberately blunt — numbers become their JSON text
/// and nested structures their compact JSON — so a malformed value can
/// never panic a rule, it just fails to match.
pub fn normalize(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let raw = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

/// Raw value as it should appear in an explanation: strings without
/// quotes, everything else as its JSON text.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn normalize_strips_whitespace_hyphens_and_case() {
        assert_eq!(normalize(Some(&json!("203-04144376-23"))), "2030414437623");
        assert_eq!(normalize(Some(&json!(" LACO-39 "))), "laco39");
        assert_eq!(normalize(Some(&json!("500 KG"))), "500kg");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["LACO-39", "  203-04 144376 ", "Leminar Air Conditioning", "ümlaut-X", ""] {
            let once = normalize(Some(&json!(raw)));
            let twice = normalize(Some(&json!(once)));
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn normalize_coerces_non_strings() {
        assert_eq!(normalize(Some(&json!(500))), "500");
        assert_eq!(normalize(Some(&json!(500.5))), "500.5");
        assert_eq!(normalize(Some(&json!(["A", "B"]))), "[\"a\",\"b\"]");
    }

    #[test]
    fn normalize_absent_is_empty() {
        assert_eq!(normalize(None), "");
        assert_eq!(normalize(Some(&Value::Null)), "");
    }

    #[test]
    fn resolve_takes_first_synonym_in_order() {
        let fields = obj(json!({
            "invoice_number": "SECOND",
            "Invoice number": "FIRST",
        }));
        let value = resolve(&fields, Attr::InvoiceNumber).unwrap();
        assert_eq!(value, &json!("FIRST"));
    }

    #[test]
    fn resolve_exporter_name_is_nested() {
        let fields = obj(json!({
            "Shipper/Exporter details": { "company_name": "Leminar" },
        }));
        assert_eq!(
            resolve(&fields, Attr::ExporterName),
            Some(&json!("Leminar"))
        );

        // A scalar where the object should be reads as absent, not a panic.
        let malformed = obj(json!({ "Shipper/Exporter details": "Leminar" }));
        assert_eq!(resolve(&malformed, Attr::ExporterName), None);
    }

    #[test]
    fn resolve_present_filters_nulls_and_empty() {
        let fields = obj(json!({ "Invoice number": null, "Total weight": "" }));
        assert!(resolve_present(&fields, Attr::InvoiceNumber).is_none());
        assert!(resolve_present(&fields, Attr::TotalWeight).is_none());
    }
}
