//! HTTP round trips through the router with in-process providers

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use rag_pipeline::embeddings::EmbeddingProvider;
use rag_pipeline::generation::{LlmBackend, LlmProvider, LlmResolver};
use rag_pipeline::retrieval::Reranker;
use rag_pipeline::server::{state::AppState, RagServer};
use rag_pipeline::{Generation, Providers, Result, ServiceConfig};

const BOUNDARY: &str = "rag-test-boundary";

struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(['a', 'e', 't']
            .iter()
            .map(|c| lower.matches(*c).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        "letters"
    }
}

struct ConstantReranker;

#[async_trait]
impl Reranker for ConstantReranker {
    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        Ok(vec![1.0; documents.len()])
    }

    fn name(&self) -> &str {
        "constant"
    }
}

struct CannedLlm;

#[async_trait]
impl LlmProvider for CannedLlm {
    async fn generate(&self, _prompt: &str, _system_prompt: &str) -> Result<Generation> {
        Ok(Generation {
            model_response: "Attention relates positions of a sequence.".to_string(),
            prompt_tokens: 30,
            completion_tokens: 6,
            total_tokens: 36,
            total_time: 0.25,
        })
    }

    fn model(&self) -> &str {
        "canned"
    }
}

struct CannedResolver;

impl LlmResolver for CannedResolver {
    fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>> {
        LlmBackend::from_model(model_name)?;
        Ok(Arc::new(CannedLlm))
    }
}

fn router() -> axum::Router {
    let providers = Providers {
        embedder: Arc::new(LetterEmbedder),
        semantic_embedder: Arc::new(LetterEmbedder),
        reranker: Arc::new(ConstantReranker),
        llm: Arc::new(CannedResolver),
    };
    let state = AppState::with_providers(ServiceConfig::default(), providers).unwrap();
    RagServer::with_state(state).router()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart_request(parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/chat/completion")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn completion_skips_unsupported_files() {
    let request = multipart_request(&[
        Part::File("notes.txt", b"Attention maps queries to keys.\nThe weather is fine.\nTransformers stack attention layers."),
        Part::File("data.xyz", b"binary junk"),
        Part::Text("method", "paragraph"),
        Part::Text("model_name", "gpt-4o-mini"),
        Part::Text("n_questions_per_chunk", "2"),
        Part::Text("query", "What is attention?"),
    ]);

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Chat completion generated successfully");

    let data = &body["data"];
    assert_eq!(data["model_response"], "Attention relates positions of a sequence.");
    assert_eq!(data["prompt_tokens"], 30);
    assert_eq!(data["completion_tokens"], 6);
    assert_eq!(data["total_tokens"], 36);
    assert_eq!(data["chunk_count"], 3);
    assert_eq!(data["contexts"].as_array().unwrap().len(), 3);
    assert!(data["run_id"].as_str().unwrap().contains('_'));
}

#[tokio::test]
async fn completion_missing_field_is_500() {
    let request = multipart_request(&[
        Part::File("notes.txt", b"Some text."),
        Part::Text("method", "character"),
        Part::Text("n_questions_per_chunk", "1"),
    ]);

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("model_name"));
}

#[tokio::test]
async fn completion_unknown_method_is_500() {
    let request = multipart_request(&[
        Part::File("notes.txt", b"Some text."),
        Part::Text("method", "fractal"),
        Part::Text("model_name", "gpt-4o-mini"),
        Part::Text("n_questions_per_chunk", "1"),
    ]);

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["detail"]
        .as_str()
        .unwrap()
        .contains("fractal"));
}

#[tokio::test]
async fn completion_with_only_unreadable_files_is_500() {
    let request = multipart_request(&[
        Part::File("slides.pptx", b"nope"),
        Part::Text("method", "word"),
        Part::Text("model_name", "ollama/llama3"),
        Part::Text("n_questions_per_chunk", "1"),
    ]);

    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
