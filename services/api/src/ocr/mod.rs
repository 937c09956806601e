//! Receipt analysis: the provider client, wire types and the normalization
//! pipeline that reconciles results onto stored documents.
pub mod client;
pub mod normalize;
pub mod pipeline;
pub mod types;

pub use client::{
    AzureClient, CallContext, DocumentAnalyzer, OcrError, RECEIPT_API_VERSION, RECEIPT_MODEL_ID,
    Submission,
};
pub use normalize::{NormalizedReceipt, normalize};
pub use pipeline::{DocumentPipeline, PipelineError};
