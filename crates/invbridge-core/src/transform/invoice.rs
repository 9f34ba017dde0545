//! fireTMS invoice → Optima invoice mapping
//!
//! ## Field Mapping
//!
//! | fireTMS                   | Optima                    |
//! |---------------------------|---------------------------|
//! | `number`                  | `docNo`                   |
//! | `issueDate`               | `issueDate`               |
//! | `currency` (default PLN)  | `currency`                |
//! | `buyer.nip`               | `contractor.taxId`        |
//! | `buyer.name` / `.address` | `contractor.name` / `.address` |
//! | `positions[].quantity`    | `items[].qty`             |
//! | `positions[].vatRate`     | `items[].vatRate` (mapped)|
//! | `totals`                  | `totals`                  |
//!
//! Unknown input fields (e.g. `updatedAt`) are ignored.

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, RawRecord, RecordId, TransformedDocument};
use crate::ports::IRecordTransformer;

// ============================================================================
// fireTMS input model
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FireTmsInvoice {
    id: String,
    number: String,
    issue_date: String,
    #[serde(default = "default_currency")]
    currency: String,
    buyer: FireTmsBuyer,
    positions: Vec<FireTmsPosition>,
    totals: Totals,
}

#[derive(Debug, Deserialize)]
struct FireTmsBuyer {
    nip: String,
    name: String,
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FireTmsPosition {
    name: String,
    quantity: f64,
    net_price: f64,
    vat_rate: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
struct Totals {
    net: f64,
    vat: f64,
    gross: f64,
}

fn default_currency() -> String {
    "PLN".to_string()
}

// ============================================================================
// Optima output model
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimaInvoice {
    doc_no: String,
    issue_date: String,
    currency: String,
    contractor: OptimaContractor,
    items: Vec<OptimaItem>,
    totals: Totals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimaContractor {
    tax_id: String,
    name: String,
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimaItem {
    name: String,
    qty: f64,
    net_price: f64,
    vat_rate: String,
}

// ============================================================================
// Mapping
// ============================================================================

/// Maps a fireTMS VAT rate to the Optima code; unknown rates pass through
pub fn map_vat_rate(rate: &str) -> &str {
    match rate {
        "23" => "23",
        "8" => "8",
        "5" => "5",
        "0" => "0",
        "np." => "NP",
        "zw." => "ZW",
        other => other,
    }
}

/// `YYYY-MM-DD` shape check: at least 10 characters with dashes at 4 and 7
fn validate_issue_date(date: &str) -> Result<(), String> {
    let bytes = date.as_bytes();
    if bytes.len() < 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(format!("issueDate must be YYYY-MM-DD, got '{date}'"));
    }
    Ok(())
}

/// Transforms fireTMS invoices into Optima invoice documents
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceTransformer;

impl InvoiceTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl IRecordTransformer for InvoiceTransformer {
    fn transform(&self, record: &RawRecord) -> Result<TransformedDocument, DomainError> {
        let label = record
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let mapping_error = |reason: String| DomainError::Mapping(format!("invoice {label}: {reason}"));

        let invoice: FireTmsInvoice = serde_json::from_value(record.as_value().clone())
            .map_err(|e| mapping_error(e.to_string()))?;

        validate_issue_date(&invoice.issue_date).map_err(mapping_error)?;
        let source_id = RecordId::new(invoice.id).map_err(|e| mapping_error(e.to_string()))?;

        let mapped = OptimaInvoice {
            doc_no: invoice.number,
            issue_date: invoice.issue_date,
            currency: invoice.currency,
            contractor: OptimaContractor {
                tax_id: invoice.buyer.nip,
                name: invoice.buyer.name,
                address: invoice.buyer.address,
            },
            items: invoice
                .positions
                .into_iter()
                .map(|p| OptimaItem {
                    vat_rate: map_vat_rate(&p.vat_rate).to_string(),
                    name: p.name,
                    qty: p.quantity,
                    net_price: p.net_price,
                })
                .collect(),
            totals: invoice.totals,
        };

        let body = serde_json::to_value(&mapped).map_err(|e| mapping_error(e.to_string()))?;

        Ok(TransformedDocument { source_id, body })
    }
}
