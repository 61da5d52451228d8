//! Receipt payload types sent to the fiscalization service.
//!
//! Field names and order follow the wire format the service expects: the
//! payload keys are camelCase, the receipt-line keys are snake_case.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An unprocessed PDF waiting in the work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Kind of document, decided by the marker text found in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptType {
    #[serde(rename = "FISCALINVOICE")]
    FiscalInvoice,
    #[serde(rename = "CREDITNOTE")]
    CreditNote,
}

impl ReceiptType {
    pub fn is_credit(self) -> bool {
        matches!(self, ReceiptType::CreditNote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "ZWL")]
    Zwl,
    Unknown,
}

/// One parsed item line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_name: String,
    pub tax_percent: f64,
    pub quantity: i64,
    pub unit_price: f64,
}

impl ReceiptLine {
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayment {
    pub money_type_code: u32,
    pub payment_amount: f64,
}

/// Reference from a credit note back to the receipt it corrects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDebitNote {
    #[serde(rename = "deviceID")]
    pub device_id: u32,
    #[serde(rename = "receiptGlobalNo")]
    pub receipt_global_no: i64,
    #[serde(rename = "fiscalDayNo")]
    pub fiscal_day_no: i64,
}

/// The JSON body submitted for one document.
///
/// `receipt_counter` and `receipt_global_no` are always `None` at emission:
/// the numbering sequence they belong to is owned by something outside this
/// crate and is not known here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    #[serde(rename = "deviceID")]
    pub device_id: u32,
    pub receipt_type: ReceiptType,
    pub receipt_currency: Currency,
    pub receipt_counter: Option<u64>,
    pub receipt_global_no: Option<u64>,
    pub invoice_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_notes: Option<String>,
    pub receipt_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_debit_note: Option<CreditDebitNote>,
    pub receipt_lines: Vec<ReceiptLine>,
    pub receipt_payments: Vec<ReceiptPayment>,
}

impl ReceiptPayload {
    /// Sum of all payment entries.
    pub fn total_payment(&self) -> f64 {
        self.receipt_payments.iter().map(|p| p.payment_amount).sum()
    }
}

/// Answer from the fiscalization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalizationResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub qr_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
