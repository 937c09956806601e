//! Receipt normalization.
//!
//! Flattens the provider's typed receipt fields into the flat columns stored
//! on a [`Document`] and the snake_case line items stored on its item row.
//! Only the first analyzed document is read; later pages of multi-page
//! receipts are not reconciled.
use crate::model::{Document, LineItem};
use crate::ocr::pipeline::PipelineError;
use crate::ocr::types::{AnalyzeResult, Field};
use chrono::{DateTime, Datelike, NaiveDate};

/// Date layouts tried in order. Four-digit-year layouts come first so a
/// two-digit layout never swallows the century.
const DATE_FORMATS: [&str; 13] = [
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%m/%d/%y",
    "%d.%m.%y",
    "%m-%d-%y",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedReceipt {
    pub merchant_name: String,
    pub merchant_address: String,
    pub merchant_phone_number: String,
    pub transaction_date: String,
    pub transaction_time: String,
    pub currency: String,
    pub sub_total: f64,
    pub total: f64,
    pub total_tax: f64,
    pub tax_details: String,
    pub total_page: i32,
    pub items: Vec<LineItem>,
}

impl NormalizedReceipt {
    /// Overwrite the extracted columns of `document`.
    pub fn apply_to(&self, document: &mut Document) {
        document.merchant_name = self.merchant_name.clone();
        document.merchant_address = self.merchant_address.clone();
        document.merchant_phone_number = self.merchant_phone_number.clone();
        document.transaction_date = self.transaction_date.clone();
        document.transaction_time = self.transaction_time.clone();
        document.currency = self.currency.clone();
        document.sub_total = self.sub_total;
        document.total = self.total;
        document.total_tax = self.total_tax;
        document.tax_details = self.tax_details.clone();
        document.total_page = self.total_page;
    }
}

pub fn normalize(result: &AnalyzeResult) -> Result<NormalizedReceipt, PipelineError> {
    let document = result.documents.first().ok_or(PipelineError::Empty)?;
    let fields = &document.fields;

    let (currency, tax_details) = match &fields.tax_details {
        Some(tax) => {
            let first = tax.value_array.first().ok_or_else(|| {
                PipelineError::Malformed("TaxDetails has no entries".to_string())
            })?;
            let currency = first
                .object_field("Amount")
                .and_then(|amount| amount.value_currency)
                .map(|value| value.currency_code)
                .unwrap_or_default();
            (currency, first.content.clone().unwrap_or_default())
        }
        None => (
            fields
                .total
                .as_ref()
                .and_then(|total| total.value_currency.as_ref())
                .map(|value| value.currency_code.clone())
                .unwrap_or_default(),
            String::new(),
        ),
    };

    let transaction_date = fields
        .transaction_date
        .as_ref()
        .and_then(|field| {
            field
                .content
                .as_deref()
                .and_then(parse_transaction_date)
                .or_else(|| field.value_date.as_deref().and_then(parse_transaction_date))
        })
        .unwrap_or_default();

    let items = fields
        .items
        .as_ref()
        .map(|items| items.value_array.iter().map(line_item).collect())
        .unwrap_or_default();

    Ok(NormalizedReceipt {
        merchant_name: fields
            .merchant_name
            .as_ref()
            .and_then(|field| field.content.clone().or_else(|| field.value_string.clone()))
            .unwrap_or_default(),
        merchant_address: content(&fields.merchant_address),
        merchant_phone_number: content(&fields.merchant_phone_number),
        transaction_date,
        transaction_time: content(&fields.transaction_time),
        currency,
        sub_total: number(&fields.subtotal),
        total: number(&fields.total),
        total_tax: number(&fields.total_tax),
        tax_details,
        total_page: i32::try_from(result.pages.len()).unwrap_or(i32::MAX),
        items,
    })
}

fn content(field: &Option<Field>) -> String {
    field
        .as_ref()
        .and_then(|field| field.content.clone())
        .unwrap_or_default()
}

fn number(field: &Option<Field>) -> f64 {
    field
        .as_ref()
        .and_then(|field| {
            field
                .value_number
                .or_else(|| field.value_currency.as_ref().map(|value| value.amount))
        })
        .unwrap_or_default()
}

/// Keep the string `content` of every sub-field, keyed in snake_case.
fn line_item(item: &Field) -> LineItem {
    item.value_object
        .iter()
        .filter_map(|(key, value)| {
            let content = value.get("content")?.as_str()?;
            Some((to_snake_case(key), content.to_string()))
        })
        .collect()
}

/// Best-effort parse of a free-text receipt date into `YYYY-MM-DD`.
pub fn parse_transaction_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive().format("%Y-%m-%d").to_string());
    }
    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .find(|date| date.year() >= 1000)
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// `TotalPrice` → `total_price`, `SKUCode` → `sku_code`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        if ch == ' ' || ch == '-' || ch == '.' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if ch.is_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out.trim_end_matches('_').to_string()
}
