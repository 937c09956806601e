use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// One receipt line: snake_case field name to the provider's text content.
pub type LineItem = BTreeMap<String, String>;

/// Uploaded receipt and the fields extracted from its analysis.
///
/// Created on upload with empty extracted fields, filled once the analysis
/// result is reconciled. Monetary values are `f64`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing, default)]
    pub original_file_name: String,
    pub file_name: String,
    pub file_path: String,
    pub apim_request_id: String,
    pub operation_location: String,
    pub model_id: String,
    pub api_version: String,
    pub merchant_name: String,
    pub merchant_address: String,
    pub merchant_phone_number: String,
    /// `YYYY-MM-DD`, empty when the provider's date could not be parsed.
    pub transaction_date: String,
    pub transaction_time: String,
    pub currency: String,
    pub sub_total: f64,
    pub total: f64,
    pub total_tax: f64,
    pub tax_details: String,
    pub total_page: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub document_item: Option<DocumentItem>,
}

/// Inputs recorded when a receipt is accepted for analysis.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: String,
    pub original_file_name: String,
    pub file_path: String,
    pub model_id: String,
    pub api_version: String,
    pub apim_request_id: String,
    pub operation_location: String,
}

impl Document {
    /// A freshly submitted document with no extracted fields and an empty item.
    pub fn submitted(new: NewDocument) -> (Document, DocumentItem) {
        let now = Utc::now();
        let id = super::new_id();
        let item = DocumentItem {
            id: super::new_id(),
            document_id: id.clone(),
            data: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let document = Document {
            id,
            user_id: new.user_id,
            file_name: new.original_file_name.clone(),
            original_file_name: new.original_file_name,
            file_path: new.file_path,
            apim_request_id: new.apim_request_id,
            operation_location: new.operation_location,
            model_id: new.model_id,
            api_version: new.api_version,
            merchant_name: String::new(),
            merchant_address: String::new(),
            merchant_phone_number: String::new(),
            transaction_date: String::new(),
            transaction_time: String::new(),
            currency: String::new(),
            sub_total: 0.0,
            total: 0.0,
            total_tax: 0.0,
            tax_details: String::new(),
            total_page: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            document_item: None,
        };
        (document, item)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentItem {
    pub id: String,
    pub document_id: String,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-editable subset of [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DocumentPatch {
    pub merchant_name: Option<String>,
    pub merchant_address: Option<String>,
    pub merchant_phone_number: Option<String>,
    pub transaction_date: Option<String>,
    pub transaction_time: Option<String>,
    pub currency: Option<String>,
    pub sub_total: Option<f64>,
    pub total: Option<f64>,
    pub total_tax: Option<f64>,
    pub tax_details: Option<String>,
}

impl DocumentPatch {
    pub fn apply(self, document: &mut Document) {
        let DocumentPatch {
            merchant_name,
            merchant_address,
            merchant_phone_number,
            transaction_date,
            transaction_time,
            currency,
            sub_total,
            total,
            total_tax,
            tax_details,
        } = self;
        if let Some(value) = merchant_name {
            document.merchant_name = value;
        }
        if let Some(value) = merchant_address {
            document.merchant_address = value;
        }
        if let Some(value) = merchant_phone_number {
            document.merchant_phone_number = value;
        }
        if let Some(value) = transaction_date {
            document.transaction_date = value;
        }
        if let Some(value) = transaction_time {
            document.transaction_time = value;
        }
        if let Some(value) = currency {
            document.currency = value;
        }
        if let Some(value) = sub_total {
            document.sub_total = value;
        }
        if let Some(value) = total {
            document.total = value;
        }
        if let Some(value) = total_tax {
            document.total_tax = value;
        }
        if let Some(value) = tax_details {
            document.tax_details = value;
        }
    }
}
