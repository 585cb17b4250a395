//! Extraction gateway for identity documents and invoices.
//!
//! Sends document images or PDFs to a multimodal model together with the
//! JSON Schema descriptor of the target record, then validates the answer
//! with `docextract-schema`.
//!
//! # Example
//!
//! ```no_run
//! use docextract_gateway::{Document, DocumentExtractor, GatewayConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let extractor = DocumentExtractor::from_config(&config)?;
//!
//! let front = Document::from_path("dni_front.jpg").await?;
//! let back = Document::from_path("dni_back.jpg").await?;
//! let dni = extractor.extract_identity_document(front, back).await?;
//! println!("{}", serde_json::to_string_pretty(&dni)?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod prompt;

pub use client::{ExtractionClient, ExtractionRequest, GeminiClient};
#[cfg(any(test, feature = "test-utils"))]
pub use client::test_support::MockExtractionClient;
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use document::{mime_type_for_path, Document};
pub use error::{ExtractError, GatewayError, Result};
pub use extractor::{extract_json_from_response, DocumentExtractor, ExtractOptions};
