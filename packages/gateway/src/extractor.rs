use docextract_schema::{
    json_schema, validate_record, IdentityDocument, Invoice, ItemizedInvoice, Record, RecordKind,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{ExtractionClient, ExtractionRequest, GeminiClient};
use crate::config::GatewayConfig;
use crate::document::Document;
use crate::error::{ExtractError, GatewayError, Result};
use crate::prompt;

/// Per-call settings for one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOptions {
    /// Appended after the descriptor. Blank falls back to the generic
    /// instructions.
    pub instructions: String,
    /// Complete prompt sent instead of the descriptor and instructions.
    pub custom_prompt: Option<String>,
    /// Overrides the configured temperature.
    pub temperature: Option<f64>,
}

impl ExtractOptions {
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            ..Self::default()
        }
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Extract-then-validate orchestrator.
///
/// Sends documents plus the record's descriptor to the extraction model and
/// runs the answer through the record validator. Gateway failures and
/// validation failures reach the caller as distinct [`ExtractError`] variants.
pub struct DocumentExtractor<C: ExtractionClient> {
    client: C,
    temperature: f64,
    max_output_tokens: u32,
}

impl DocumentExtractor<GeminiClient> {
    /// Extractor backed by the Gemini API.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Ok(Self::new(GeminiClient::new(config)?, config))
    }
}

impl<C: ExtractionClient> DocumentExtractor<C> {
    pub fn new(client: C, config: &GatewayConfig) -> Self {
        Self {
            client,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Raw extraction: the model's JSON answer, not yet validated.
    ///
    /// A non-blank `custom_prompt` replaces the prompt built from `descriptor`.
    pub async fn extract(
        &self,
        documents: Vec<Document>,
        descriptor: &Value,
        options: &ExtractOptions,
    ) -> Result<Value> {
        if documents.is_empty() {
            return Err(GatewayError::UnsupportedDocument(
                "no documents to extract from".into(),
            ));
        }

        let temperature = options.temperature.unwrap_or(self.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(GatewayError::Config(format!(
                "temperature {temperature} is outside 0.0..=2.0"
            )));
        }

        let prompt = match options.custom_prompt.as_deref() {
            Some(custom) if !custom.trim().is_empty() => {
                debug!("using custom prompt");
                custom.to_string()
            }
            _ => prompt::build_extraction_prompt(descriptor, &options.instructions),
        };

        let request = ExtractionRequest {
            documents,
            prompt,
            temperature,
            max_output_tokens: self.max_output_tokens,
        };

        let text = self.client.generate(&request).await?;
        let json_text = extract_json_from_response(&text);
        debug!(len = json_text.len(), "extraction response received");

        serde_json::from_str(&json_text).map_err(|e| {
            warn!(error = %e, "extraction response is not valid JSON");
            GatewayError::MalformedJson(e.to_string())
        })
    }

    /// Extract with the record's own descriptor and validate the answer as `T`.
    pub async fn extract_and_validate<T: Record>(
        &self,
        documents: Vec<Document>,
        options: &ExtractOptions,
    ) -> std::result::Result<T, ExtractError> {
        info!(record = %T::KIND, documents = documents.len(), "extracting record");

        let descriptor = json_schema(T::KIND);
        let raw = self.extract(documents, &descriptor, options).await?;
        let record = validate_record::<T>(&raw)?;

        info!(record = %T::KIND, "record extracted");
        Ok(record)
    }

    /// DNI/NIE from its front and back images, in that order.
    pub async fn extract_identity_document(
        &self,
        front: Document,
        back: Document,
    ) -> std::result::Result<IdentityDocument, ExtractError> {
        let instructions = prompt::instructions_for(RecordKind::IdentityDocument);
        let options = ExtractOptions::with_instructions(instructions);
        self.extract_and_validate(vec![front, back], &options).await
    }

    /// Electricity bill from a single image or PDF.
    pub async fn extract_invoice(
        &self,
        invoice: Document,
    ) -> std::result::Result<Invoice, ExtractError> {
        let instructions = prompt::instructions_for(RecordKind::Invoice);
        let options = ExtractOptions::with_instructions(instructions);
        self.extract_and_validate(vec![invoice], &options).await
    }

    /// Generic line-item invoice from a single image or PDF.
    pub async fn extract_itemized_invoice(
        &self,
        invoice: Document,
    ) -> std::result::Result<ItemizedInvoice, ExtractError> {
        let instructions = prompt::instructions_for(RecordKind::ItemizedInvoice);
        let options = ExtractOptions::with_instructions(instructions);
        self.extract_and_validate(vec![invoice], &options).await
    }
}

/// Extract the JSON payload from a model response.
///
/// Models sometimes wrap JSON in markdown fences even when asked not to. The
/// first fenced block wins; without fences the trimmed text is returned.
pub fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip optional language identifier on the same line
        let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim().to_string();
        }
    }

    trimmed.to_string()
}
