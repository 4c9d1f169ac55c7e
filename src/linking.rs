// src/linking.rs

use crate::document::DocumentRecord;
use crate::fields::{self, Attr};
use tracing::info;

/// The four-slot role assignment produced for one compliance run.
///
/// Built once from a batch of records and read-only afterwards; slots
/// with no counterpart simply stay empty and the rules report them.
#[derive(Debug, Clone, Default)]
pub struct LinkedDocuments {
    pub invoice: Option<DocumentRecord>,
    pub customs_declaration: Option<DocumentRecord>,
    pub waybill: Option<DocumentRecord>,
    pub customs_certificate: Option<DocumentRecord>,
}

impl LinkedDocuments {
    /// Slots in their canonical order, with their wire names.
    pub fn slots(&self) -> [(&'static str, Option<&DocumentRecord>); 4] {
        [
            ("invoice", self.invoice.as_ref()),
            ("customs_declaration", self.customs_declaration.as_ref()),
            ("waybill", self.waybill.as_ref()),
            ("customs_certificate", self.customs_certificate.as_ref()),
        ]
    }
}

/// Assign roles to a batch of records by identifier matching.
///
/// The first record carrying an invoice number becomes the invoice (one
/// invoice per batch). Its declaration, CRN and bill numbers are the
/// targets the remaining records are matched against; the invoice number
/// itself only identifies the invoice and is logged for display.
pub fn link_documents(docs: &[DocumentRecord]) -> LinkedDocuments {
    let invoice = docs
        .iter()
        .find(|doc| fields::resolve_present(&doc.fields, Attr::InvoiceNumber).is_some());

    if let Some(doc) = invoice {
        let invoice_no = fields::resolve(&doc.fields, Attr::InvoiceNumber)
            .map(fields::display)
            .unwrap_or_default();
        info!(id = %doc.id, invoice_no = %invoice_no, "Invoice identified");
    }

    let target = |attr: Attr| {
        invoice
            .map(|doc| fields::normalize(fields::resolve(&doc.fields, attr)))
            .unwrap_or_default()
    };
    let target_dec = target(Attr::DeclarationNumber);
    let target_crn = target(Attr::CrnNumber);
    let target_bill = target(Attr::BillNumber);

    let mut declaration: Option<&DocumentRecord> = None;
    let mut waybill: Option<&DocumentRecord> = None;
    let mut certificate: Option<&DocumentRecord> = None;

    for doc in docs {
        // A record never links to itself, even when it carries more than
        // one identifying field. Identity, not id equality.
        if invoice.is_some_and(|inv| std::ptr::eq(inv, doc)) {
            continue;
        }
        // An empty target never matches: an identifier missing from the
        // invoice must not link to records that also lack it. When several
        // records match the same slot, the last one in scan order wins.
        if matches_target(doc, Attr::DeclarationNumber, &target_dec) {
            declaration = Some(doc);
        }
        if matches_target(doc, Attr::CrnNumber, &target_crn) {
            waybill = Some(doc);
        }
        if matches_target(doc, Attr::BillNumber, &target_bill) {
            certificate = Some(doc);
        }
    }

    info!(
        invoice = ?invoice.map(|d| &d.id),
        customs_declaration = ?declaration.map(|d| &d.id),
        waybill = ?waybill.map(|d| &d.id),
        customs_certificate = ?certificate.map(|d| &d.id),
        "Linked documents"
    );

    LinkedDocuments {
        invoice: invoice.cloned(),
        customs_declaration: declaration.cloned(),
        waybill: waybill.cloned(),
        customs_certificate: certificate.cloned(),
    }
}

fn matches_target(doc: &DocumentRecord, attr: Attr, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    match fields::resolve(&doc.fields, attr) {
        Some(value) => fields::normalize(Some(value)) == target,
        None => false,
    }
}
