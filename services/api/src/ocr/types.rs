//! Wire shapes of the document analysis provider.
//!
//! Only the fields the pipeline reads are modelled. Everything else in the
//! provider payload is ignored during deserialization.
use serde::Deserialize;
use std::collections::BTreeMap;

/// Body returned by the analyze-result endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeOperation {
    pub status: String,
    pub analyze_result: Option<AnalyzeResult>,
    pub error: Option<ProviderErrorDetail>,
}

impl AnalyzeOperation {
    pub const SUCCEEDED: &'static str = "succeeded";
    pub const FAILED: &'static str = "failed";

    pub fn is_succeeded(&self) -> bool {
        self.status == Self::SUCCEEDED
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResult {
    pub api_version: String,
    pub model_id: String,
    pub content: String,
    pub pages: Vec<serde_json::Value>,
    pub documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedDocument {
    pub doc_type: String,
    pub confidence: f64,
    pub fields: ReceiptFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReceiptFields {
    pub merchant_name: Option<Field>,
    pub merchant_address: Option<Field>,
    pub merchant_phone_number: Option<Field>,
    pub transaction_date: Option<Field>,
    pub transaction_time: Option<Field>,
    pub subtotal: Option<Field>,
    pub total: Option<Field>,
    pub total_tax: Option<Field>,
    pub tax_details: Option<Field>,
    pub items: Option<Field>,
}

/// A typed value extracted by the provider.
///
/// `value_object` entries stay as raw JSON because line items carry
/// arbitrary, model-dependent keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Field {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Option<String>,
    pub value_string: Option<String>,
    pub value_date: Option<String>,
    pub value_number: Option<f64>,
    pub value_currency: Option<CurrencyValue>,
    pub value_array: Vec<Field>,
    pub value_object: BTreeMap<String, serde_json::Value>,
    pub confidence: Option<f64>,
}

impl Field {
    /// Typed view of a `value_object` entry, if it has the field shape.
    pub fn object_field(&self, key: &str) -> Option<Field> {
        self.value_object
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrencyValue {
    pub amount: f64,
    pub currency_code: String,
    pub currency_symbol: String,
}

/// `{"error": {...}}` envelope of a rejected provider call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderErrorDetail {
    pub code: String,
    pub message: String,
    pub innererror: Option<Box<ProviderErrorDetail>>,
}

impl ProviderErrorDetail {
    /// The most specific message available.
    pub fn best_message(&self) -> String {
        self.innererror
            .as_ref()
            .map(|inner| inner.best_message())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| self.message.clone())
    }
}

/// Extract a readable provider message from a raw error body.
pub fn provider_error_message(body: &str) -> String {
    match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed.error.best_message();
            if message.is_empty() {
                body.to_string()
            } else {
                message
            }
        }
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_error_message_wins() {
        let body = r#"{"error":{"code":"InvalidRequest","message":"Invalid request.",
            "innererror":{"code":"InvalidContent","message":"The file is corrupted or format is unsupported."}}}"#;
        assert_eq!(
            provider_error_message(body),
            "The file is corrupted or format is unsupported."
        );
    }

    #[test]
    fn outer_message_and_raw_body_fallbacks() {
        let body = r#"{"error":{"code":"401","message":"Access denied"}}"#;
        assert_eq!(provider_error_message(body), "Access denied");
        assert_eq!(provider_error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn operation_ignores_unknown_fields() {
        let body = r#"{"status":"succeeded","createdDateTime":"2024-03-15T10:00:00Z",
            "analyzeResult":{"apiVersion":"2023-07-31","modelId":"prebuilt-receipt",
            "pages":[{"pageNumber":1}],"documents":[{"docType":"receipt.retailMeal",
            "fields":{"Total":{"type":"number","valueNumber":12.5,"content":"$12.50"}}}]}}"#;
        let op: AnalyzeOperation = serde_json::from_str(body).unwrap();
        assert!(op.is_succeeded());
        let result = op.analyze_result.unwrap();
        assert_eq!(result.pages.len(), 1);
        let total = result.documents[0].fields.total.clone().unwrap();
        assert_eq!(total.value_number, Some(12.5));
    }
}
