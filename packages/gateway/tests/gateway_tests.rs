//! Extraction against a mock Gemini server.

use std::time::Duration;

use docextract_gateway::{
    Document, DocumentExtractor, ExtractError, ExtractOptions, ExtractionClient,
    ExtractionRequest, GatewayConfig, GatewayError, GeminiClient,
};
use docextract_schema::{ItemizedInvoice, RecordKind};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-test:generateContent";

fn config(server: &MockServer) -> GatewayConfig {
    GatewayConfig::builder("test-key")
        .api_base_url(server.uri())
        .model("gemini-test")
        .timeout_secs(5)
        .build()
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(&config(server))
        .expect("client")
        .with_retry_delays(vec![Duration::from_millis(10), Duration::from_millis(10)])
}

fn gemini_answer(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 180}
    })
}

fn request() -> ExtractionRequest {
    ExtractionRequest {
        documents: vec![Document::new(b"abc".to_vec(), "image/png")],
        prompt: "extract".into(),
        temperature: 0.1,
        max_output_tokens: 1024,
    }
}

fn invoice_answer() -> Value {
    json!({
        "holder": {
            "first_name": "JUAN",
            "first_surname": "PEREZ",
            "second_surname": "GOMEZ",
            "nif": "12345678Z",
            "address": {
                "street": "MAYOR",
                "street_number": "12",
                "city": "MADRID",
                "province": "MADRID",
                "postal_code": "28013"
            }
        },
        "supply_point": {
            "address": {
                "street": "MAYOR",
                "street_number": "12",
                "city": "MADRID",
                "province": "MADRID",
                "postal_code": "28013"
            },
            "cups": "ES0031405000000000AB",
            "distributor_company": null,
            "contracted_power": [4.6, 4.6],
            "voltage_raw": 230
        }
    })
}

#[tokio::test]
async fn test_generate_sends_inline_documents() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "YWJj"}},
                    {"text": "extract"}
                ]
            }],
            "generationConfig": {
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_answer("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).generate(&request()).await.expect("answer");
    assert_eq!(text, "{\"ok\": true}");
}

#[tokio::test]
async fn test_client_error_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).generate(&request()).await.expect_err("400");
    match err {
        GatewayError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_answer("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).generate(&request()).await.expect("retried");
    assert_eq!(text, "{}");
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).generate(&request()).await.expect_err("500s");
    assert!(matches!(err, GatewayError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_empty_candidates_are_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let err = client(&server)
        .with_retry_delays(vec![])
        .generate(&request())
        .await
        .expect_err("empty");
    assert!(matches!(err, GatewayError::EmptyResponse));
}

#[tokio::test]
async fn test_extract_invoice_end_to_end() {
    let server = MockServer::start().await;

    let fenced = format!("```json\n{}\n```", invoice_answer());
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_answer(&fenced)))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = DocumentExtractor::new(client(&server), &config(&server));
    let invoice = extractor
        .extract_invoice(Document::new(b"%PDF-1.7".to_vec(), "application/pdf"))
        .await
        .expect("valid invoice");

    assert_eq!(invoice.supply_point.distributor_company, "e-distribución Redes Digitales");
    assert_eq!(invoice.supply_point.contracted_power, 4.6);
    assert_eq!(invoice.supply_point.voltage, 400);
}

#[tokio::test]
async fn test_extract_invoice_reports_validation_errors() {
    let server = MockServer::start().await;

    let mut answer = invoice_answer();
    answer["supply_point"]["cups"] = Value::Null;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_answer(&answer.to_string())),
        )
        .mount(&server)
        .await;

    let extractor = DocumentExtractor::new(client(&server), &config(&server));
    let err = extractor
        .extract_invoice(Document::new(b"%PDF-1.7".to_vec(), "application/pdf"))
        .await
        .expect_err("cups missing");

    let validation = match err {
        ExtractError::Validation(validation) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert_eq!(validation.record, RecordKind::Invoice);
    let paths: Vec<_> = validation.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["supply_point.cups"]);
}

#[tokio::test]
async fn test_document_from_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("factura.PDF");
    std::fs::write(&file, b"%PDF-1.7").expect("write");

    let doc = Document::from_path(&file).await.expect("load");
    assert_eq!(doc.mime_type, "application/pdf");
    assert_eq!(doc.bytes, b"%PDF-1.7");

    let missing = Document::from_path(dir.path().join("missing.png")).await;
    assert!(matches!(missing, Err(GatewayError::Io(_))));

    let text = dir.path().join("notes.txt");
    std::fs::write(&text, b"hello").expect("write");
    assert!(matches!(
        Document::from_path(&text).await,
        Err(GatewayError::UnsupportedDocument(_))
    ));
}

#[tokio::test]
async fn test_itemized_invoice_with_custom_prompt() {
    let server = MockServer::start().await;

    let answer = json!({
        "vendor_name": "Ferretería López S.L.",
        "vat_number": "B-12345678",
        "date": "05 02 2024",
        "items": [
            {"description": "Tornillos", "quantity": 3, "unit_price": "4,20", "total": 12.6},
            {"description": "Transporte", "quantity": 1, "unit_price": 7.5, "total": 7.5}
        ],
        "total_amount": 20.1,
        "currency": "EUR"
    });
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"inlineData": {"mimeType": "application/pdf"}},
                    {"text": "List every invoice line as JSON."}
                ]
            }],
            "generationConfig": {"temperature": 0.4}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gemini_answer(&answer.to_string())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let extractor = DocumentExtractor::new(client(&server), &config(&server));
    let options = ExtractOptions::default()
        .custom_prompt("List every invoice line as JSON.")
        .temperature(0.4);
    let invoice = extractor
        .extract_and_validate::<ItemizedInvoice>(
            vec![Document::new(b"%PDF-1.7".to_vec(), "application/pdf")],
            &options,
        )
        .await
        .expect("valid invoice");

    assert_eq!(invoice.vat_number.as_deref(), Some("B12345678"));
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.items[0].unit_price, 4.2);
    assert_eq!(invoice.currency.as_deref(), Some("EUR"));
}
