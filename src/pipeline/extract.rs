//! Extraction: classify a document and build its [`ReceiptPayload`].
//!
//! Everything here works on plain text (the lines the text reader produced),
//! so it is testable without pdfium.
//!
//! ## Item lines
//!
//! Item rows have no reliable column markers in the source documents. The
//! parser in [`parse_item_line`] guesses where the item name ends by looking
//! for the first integer among the next three tokens. It is positional and
//! fragile; replace it with a column-aware parser once the real layout is
//! pinned down.

use crate::config::PipelineConfig;
use crate::error::DocumentError;
use crate::receipt::{
    CreditDebitNote, Currency, ReceiptLine, ReceiptPayload, ReceiptPayment, ReceiptType,
};
use chrono::NaiveDate;
use tracing::debug;

pub const CREDIT_NOTE_MARKER: &str = "CREDIT NOTE";
pub const INVOICE_MARKER: &str = "Fiscal Tax Invoice";

pub const FIELD_DOCUMENT_NO: &str = "Document No.";
pub const FIELD_DATE: &str = "Date";
pub const FIELD_FISCAL_DAY: &str = "Fiscal Day#";
pub const FIELD_REFERENCED_RECEIPT: &str = "Zimra Invoice#";

const ITEM_HEADER: &str = "Description";

/// Device and payment constants applied to every payload.
#[derive(Debug, Clone)]
pub struct PayloadDefaults {
    pub invoice_device_id: u32,
    pub credit_note_device_id: u32,
    pub money_type_code: u32,
    pub credit_note_reason: String,
}

impl From<&PipelineConfig> for PayloadDefaults {
    fn from(c: &PipelineConfig) -> Self {
        Self {
            invoice_device_id: c.invoice_device_id,
            credit_note_device_id: c.credit_note_device_id,
            money_type_code: c.money_type_code,
            credit_note_reason: c.credit_note_reason.clone(),
        }
    }
}

impl Default for PayloadDefaults {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Decide the document type from its marker text. The credit-note marker
/// wins when both are present.
pub fn classify(text: &str) -> Result<ReceiptType, DocumentError> {
    if text.contains(CREDIT_NOTE_MARKER) {
        Ok(ReceiptType::CreditNote)
    } else if text.contains(INVOICE_MARKER) {
        Ok(ReceiptType::FiscalInvoice)
    } else {
        Err(DocumentError::UnsupportedDocument)
    }
}

/// Build the payload for a document's full text.
pub fn extract_payload(
    text: &str,
    defaults: &PayloadDefaults,
) -> Result<ReceiptPayload, DocumentError> {
    let receipt_type = classify(text)?;
    let lines: Vec<&str> = text.lines().collect();
    let is_credit = receipt_type.is_credit();

    let invoice_no = extract_field(&lines, FIELD_DOCUMENT_NO).map(str::to_string);
    let receipt_date = parse_receipt_date(require_field(&lines, FIELD_DATE)?)?;

    let credit_debit_note = if is_credit {
        let fiscal_day_no = parse_int_field(&lines, FIELD_FISCAL_DAY)?;
        let receipt_global_no = parse_int_field(&lines, FIELD_REFERENCED_RECEIPT)?;
        Some(CreditDebitNote {
            device_id: defaults.credit_note_device_id,
            receipt_global_no,
            fiscal_day_no,
        })
    } else {
        None
    };

    let receipt_currency = resolve_currency(&lines);
    let receipt_lines = extract_items(&lines, is_credit)?;
    let total_payment: f64 = receipt_lines.iter().map(ReceiptLine::line_total).sum();

    debug!(
        "Extracted {:?}: {} lines, total {}",
        receipt_type,
        receipt_lines.len(),
        total_payment
    );

    Ok(ReceiptPayload {
        device_id: if is_credit {
            defaults.credit_note_device_id
        } else {
            defaults.invoice_device_id
        },
        receipt_type,
        receipt_currency,
        receipt_counter: None,
        receipt_global_no: None,
        invoice_no,
        receipt_notes: is_credit.then(|| defaults.credit_note_reason.clone()),
        receipt_date,
        credit_debit_note,
        receipt_lines,
        receipt_payments: vec![ReceiptPayment {
            money_type_code: defaults.money_type_code,
            payment_amount: total_payment,
        }],
    })
}

/// Value of a labelled field: the first line containing `field`, taking
/// whatever follows the label's last occurrence on that line, trimmed.
pub fn extract_field<'a>(lines: &[&'a str], field: &str) -> Option<&'a str> {
    lines
        .iter()
        .copied()
        .find(|line| line.contains(field))
        .and_then(|line| line.rsplit(field).next())
        .map(str::trim)
}

fn require_field<'a>(lines: &[&'a str], field: &str) -> Result<&'a str, DocumentError> {
    extract_field(lines, field).ok_or_else(|| DocumentError::MissingField {
        field: field.to_string(),
    })
}

fn parse_int_field(lines: &[&str], field: &str) -> Result<i64, DocumentError> {
    let value = require_field(lines, field)?;
    value.parse().map_err(|_| DocumentError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// `dd/mm/yyyy` → `yyyy-mm-ddT00:00:00`.
pub fn parse_receipt_date(value: &str) -> Result<String, DocumentError> {
    let date = NaiveDate::parse_from_str(value, "%d/%m/%Y").map_err(|_| {
        DocumentError::InvalidDate {
            value: value.to_string(),
        }
    })?;
    Ok(date.format("%Y-%m-%dT00:00:00").to_string())
}

/// USD if the final line says so; otherwise the first line mentioning USD or
/// ZWL decides; otherwise unknown.
pub fn resolve_currency(lines: &[&str]) -> Currency {
    if lines.last().is_some_and(|l| l.contains("USD")) {
        return Currency::Usd;
    }
    for line in lines {
        if line.contains("USD") {
            return Currency::Usd;
        } else if line.contains("ZWL") {
            return Currency::Zwl;
        }
    }
    Currency::Unknown
}

/// Parse every item row below the `Description` header.
///
/// Lines mentioning USD are taken to be currency or header rows and skipped;
/// lines with fewer than four tokens are ignored.
pub fn extract_items(lines: &[&str], is_credit: bool) -> Result<Vec<ReceiptLine>, DocumentError> {
    let mut items = Vec::new();
    let mut in_items = false;

    for line in lines {
        if line.contains(ITEM_HEADER) {
            in_items = true;
            continue;
        }
        if !in_items || line.contains("USD") {
            continue;
        }
        if let Some(item) = parse_item_line(line, is_credit)? {
            items.push(item);
        }
    }

    Ok(items)
}

/// Parse one item row: `name… quantity … unit_price tax%`.
///
/// Returns `Ok(None)` for rows with fewer than four tokens. The name is the
/// first token plus up to two more if the token after it is not an integer.
pub fn parse_item_line(line: &str, is_credit: bool) -> Result<Option<ReceiptLine>, DocumentError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Ok(None);
    }

    let invalid = |detail: String| DocumentError::InvalidItemLine {
        line: line.to_string(),
        detail,
    };

    let mut name_len = 1;
    let quantity = loop {
        match parts[name_len].parse::<i64>() {
            Ok(q) => break q,
            Err(_) if name_len < 3 => name_len += 1,
            Err(_) => {
                return Err(invalid(format!(
                    "no integer quantity among '{}'",
                    parts[1..=3].join(" ")
                )))
            }
        }
    };
    let item_name = parts[..name_len].join(" ");

    let price_token = parts[parts.len() - 2];
    let unit_price: f64 = price_token
        .parse()
        .map_err(|_| invalid(format!("unit price '{price_token}' is not a number")))?;

    let tax_token = parts[parts.len() - 1];
    let tax_percent = if tax_token.contains('%') {
        let digits = tax_token.trim_matches('%');
        digits
            .parse()
            .map_err(|_| invalid(format!("tax '{tax_token}' is not a percentage")))?
    } else {
        0.0
    };

    let (quantity, unit_price) = if is_credit {
        let magnitude = quantity
            .checked_abs()
            .ok_or_else(|| invalid(format!("quantity {quantity} cannot be negated")))?;
        (-magnitude, -unit_price.abs())
    } else {
        (quantity, unit_price)
    };

    Ok(Some(ReceiptLine {
        item_name,
        tax_percent,
        quantity,
        unit_price,
    }))
}
