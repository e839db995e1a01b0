use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;

use llm_testing_client::transport::MockTransport;
use llm_testing_client::types::chat::{ChatRequest, ChatStreamEvent};
use llm_testing_client::types::{
    ApiError, HttpRequest, HttpVerb, UNKNOWN_ERROR_DETAIL, UNREADABLE_STREAM_DETAIL,
};
use llm_testing_client::{ApiClient, Error, Result};

const CHAT_STREAM: &str = "/api/chat-stream";

fn client_with(transport: &Arc<MockTransport>) -> Result<ApiClient> {
    ApiClient::builder()
        .base_url("http://mock.backend.local")
        .transport(transport.clone())
        .build()
}

/// Everything observed through the callback surface of one call.
#[derive(Debug, Default)]
struct Outcome {
    contents: Vec<String>,
    errors: Vec<ApiError>,
    completions: usize,
}

async fn run_chat(client: &ApiClient, request: ChatRequest) -> Outcome {
    let contents = RefCell::new(Vec::new());
    let errors = RefCell::new(Vec::new());
    let completions = Cell::new(0);

    client
        .send_chat_message(
            request,
            |chunk| contents.borrow_mut().push(chunk.content),
            |err| errors.borrow_mut().push(err),
            || completions.set(completions.get() + 1),
        )
        .await;

    Outcome {
        contents: contents.into_inner(),
        errors: errors.into_inner(),
        completions: completions.get(),
    }
}

#[tokio::test]
async fn test_api_call_returns_body_unchanged() -> Result<()> {
    let body = json!({"nested": {"list": [1, 2, 3]}, "flag": true, "text": "값"});
    let transport = Arc::new(MockTransport::new().with_json_response("/api/anything", 200, body.clone()));
    let client = client_with(&transport)?;

    let value: serde_json::Value = client.api_call(HttpRequest::new("/anything")).await?;
    assert_eq!(value, body);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "/api/anything");
    assert_eq!(requests[0].verb, HttpVerb::GET);
    assert_eq!(requests[0].headers[CONTENT_TYPE], "application/json");
    Ok(())
}

#[tokio::test]
async fn test_api_call_error_carries_detail_and_status() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        "/api/config",
        503,
        json!({"detail": "maintenance"}),
    ));
    let client = client_with(&transport)?;

    match client.api_call::<serde_json::Value>(HttpRequest::new("/config")).await {
        Err(Error::Api(err)) => assert_eq!(err, ApiError::new("maintenance", 503)),
        other => panic!("Expected Api error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_api_call_error_without_detail_uses_fallback() -> Result<()> {
    let transport = Arc::new(
        MockTransport::new()
            .with_response("/api/config", 500, "Internal Server Error")
            .with_json_response("/api/health", 418, json!({"message": "teapot"})),
    );
    let client = client_with(&transport)?;

    for endpoint in ["/config", "/health"] {
        match client.api_call::<serde_json::Value>(HttpRequest::new(endpoint)).await {
            Err(Error::Api(err)) => assert_eq!(err.detail, UNKNOWN_ERROR_DETAIL),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_api_call_merges_caller_headers() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response("/api/echo", 200, json!({})));
    let client = ApiClient::builder()
        .base_url("http://mock.backend.local")
        .default_header("x-client", "llm-testing")
        .transport(transport.clone())
        .build()?;

    let request = HttpRequest::new("/echo")
        .put()
        .header("Content-Type", "application/merge-patch+json")?
        .header("X-Request-Id", "42")?
        .body(json!({"op": "touch"}))?;
    let _: serde_json::Value = client.api_call(request).await?;

    let sent = &transport.requests()[0];
    assert_eq!(sent.verb, HttpVerb::PUT);
    assert_eq!(sent.headers[CONTENT_TYPE], "application/merge-patch+json");
    assert_eq!(sent.headers["x-request-id"], "42");
    assert_eq!(sent.headers["x-client"], "llm-testing");
    assert_eq!(sent.body, Some(json!({"op": "touch"})));
    Ok(())
}

#[tokio::test]
async fn test_custom_api_prefix() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        "/v2/health",
        200,
        json!({"status": "healthy"}),
    ));
    let client = ApiClient::builder()
        .api_prefix("v2/")
        .transport(transport.clone())
        .build()?;

    let report = client.health_check().await?;
    assert_eq!(report.status(), Some("healthy"));
    assert_eq!(transport.requests()[0].url, "/v2/health");
    Ok(())
}

#[test]
fn test_invalid_base_url_fails_build() {
    let result = ApiClient::builder().base_url("not a url").build();
    assert!(matches!(result, Err(Error::Client(_))));
}

#[tokio::test]
async fn test_get_server_config() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        "/api/config",
        200,
        json!({
            "backend_port": "8000",
            "host": "0.0.0.0",
            "cors_origins": "http://localhost:5173",
            "debug": false,
            "environment": "development"
        }),
    ));
    let client = client_with(&transport)?;

    let config = client.get_server_config().await?;
    assert_eq!(config.backend_port().as_deref(), Some("8000"));
    assert_eq!(config.environment(), Some("development"));
    assert_eq!(config.debug(), Some(false));
    assert_eq!(config.supported_models_count(), None);
    Ok(())
}

#[tokio::test]
async fn test_get_server_config_tolerates_unexpected_types() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        "/api/config",
        200,
        json!({"backend_port": 8000, "debug": "false", "host": ["a", "b"]}),
    ));
    let client = client_with(&transport)?;

    let config = client.get_server_config().await?;
    assert_eq!(config.backend_port().as_deref(), Some("8000"));
    assert_eq!(config.debug(), None);
    assert_eq!(config.host(), None);
    assert_eq!(config.get("host"), Some(&json!(["a", "b"])));
    Ok(())
}

#[tokio::test]
async fn test_check_server_status() -> Result<()> {
    let healthy = Arc::new(MockTransport::new().with_json_response(
        "/api/health",
        200,
        json!({"message": "ok", "data": {"status": "healthy"}}),
    ));
    assert!(client_with(&healthy)?.check_server_status().await);

    let failing = Arc::new(MockTransport::new().with_json_response(
        "/api/health",
        500,
        json!({"detail": "service error"}),
    ));
    assert!(!client_with(&failing)?.check_server_status().await);

    let unreachable = Arc::new(MockTransport::new().with_unreachable("/api/health", "connection refused"));
    assert!(!client_with(&unreachable)?.check_server_status().await);

    // Nothing configured: the mock answers 404.
    let empty = Arc::new(MockTransport::new());
    assert!(!client_with(&empty)?.check_server_status().await);
    Ok(())
}

#[tokio::test]
async fn test_check_server_status_accepts_any_json_on_success() -> Result<()> {
    let numeric_timestamp = Arc::new(MockTransport::new().with_json_response(
        "/api/health",
        200,
        json!({"status": "healthy", "timestamp": 1720569600}),
    ));
    assert!(client_with(&numeric_timestamp)?.check_server_status().await);

    let bare_string = Arc::new(MockTransport::new().with_json_response("/api/health", 200, json!("ok")));
    let client = client_with(&bare_string)?;
    assert!(client.check_server_status().await);
    assert_eq!(client.health_check().await?.as_value(), &json!("ok"));
    Ok(())
}

#[tokio::test]
async fn test_list_models() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        "/api/models",
        200,
        json!({
            "models": {
                "claude-3-haiku": {
                    "name": "claude-3-haiku",
                    "provider": "anthropic",
                    "max_tokens": 4096,
                    "temperature_range": [0.0, 1.0],
                    "description": "fast"
                }
            },
            "total_count": 1
        }),
    ));
    let client = client_with(&transport)?;

    let listing = client.list_models().await?;
    assert_eq!(listing.total_count, 1);
    assert_eq!(listing.models["claude-3-haiku"].provider, "anthropic");
    Ok(())
}

#[tokio::test]
async fn test_prompt_variable_endpoints() -> Result<()> {
    let transport = Arc::new(
        MockTransport::new()
            .with_json_response(
                "/api/extract-variables",
                200,
                json!({
                    "message": "done",
                    "data": {"variables": ["name", "topic"], "template": {"name": "", "topic": ""}, "count": 2}
                }),
            )
            .with_json_response(
                "/api/validate-variables",
                200,
                json!({
                    "message": "done",
                    "data": {"is_valid": false, "missing_variables": {"topic": ""}, "missing_count": 1}
                }),
            ),
    );
    let client = client_with(&transport)?;
    let prompt = "Hi {{name}}, tell me about {{topic}}";

    let extraction = client.extract_variables(prompt).await?;
    let extraction = extraction.data.expect("extraction data");
    assert_eq!(extraction.variables, vec!["name", "topic"]);
    assert_eq!(extraction.count, 2);

    let mut supplied = BTreeMap::new();
    supplied.insert("name".to_string(), "Ferris".to_string());
    let validation = client.validate_variables(prompt, &supplied).await?;
    let validation = validation.data.expect("validation data");
    assert!(!validation.is_valid);
    assert!(validation.missing_variables.contains_key("topic"));

    let requests = transport.requests();
    assert_eq!(requests[0].verb, HttpVerb::POST);
    assert_eq!(requests[0].body, Some(json!({"prompt": prompt})));
    assert_eq!(
        requests[1].body,
        Some(json!({"prompt": prompt, "variables": {"name": "Ferris"}}))
    );
    Ok(())
}

#[tokio::test]
async fn test_chat_request_serialization_omits_unset_fields() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_stream_response(CHAT_STREAM, 200, vec![""]));
    let client = ApiClient::builder()
        .base_url("http://mock.backend.local")
        .default_header("x-client", "llm-testing")
        .transport(transport.clone())
        .build()?;

    let request = ChatRequest::new().user("Hi").assistant("Hello").temperature(0.5);
    client.chat_stream(request).await?.collect_content().await?;

    let sent = &transport.requests()[0];
    assert_eq!(sent.url, CHAT_STREAM);
    assert_eq!(sent.verb, HttpVerb::POST);
    assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
    assert_eq!(sent.headers["x-client"], "llm-testing");
    assert_eq!(sent.headers.len(), 2);
    assert_eq!(
        sent.body,
        Some(json!({
            "messages": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello"}
            ],
            "temperature": 0.5
        }))
    );
    Ok(())
}

#[tokio::test]
async fn test_chat_stream_yields_chunks_then_completed() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_stream_response(
        CHAT_STREAM,
        200,
        vec![
            "data: {\"content\":\"Hel\",\"is_complete\":false,\"model\":\"m\"}\n\n",
            "data: {\"content\":\"lo\",\"is_complete\":false,\"model\":\"m\"}\n\n",
            "data: {\"content\":\"\",\"is_complete\":true,\"model\":\"m\"}\n\n",
        ],
    ));
    let client = client_with(&transport)?;

    let mut stream = client.chat_stream(ChatRequest::new().user("Hi").model("m")).await?;
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event?);
    }

    assert_eq!(events.len(), 4);
    match &events[2] {
        ChatStreamEvent::Chunk(chunk) => assert!(chunk.is_complete),
        other => panic!("Expected Chunk event, got {:?}", other),
    }
    assert_eq!(events[3], ChatStreamEvent::Completed);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_delivers_chunks_in_order() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_stream_response(
        CHAT_STREAM,
        200,
        vec![
            "data: {\"content\":\"a\"}\n",
            "\ndata: {\"content\":\"b\"}\n\n",
        ],
    ));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new().user("go")).await;
    assert_eq!(outcome.contents, vec!["a", "b"]);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.completions, 1);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_skips_malformed_records() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_stream_response(
        CHAT_STREAM,
        200,
        vec!["data: {\"content\":\"a\"}\n\ndata: {broken\n\ndata: {\"content\":\"c\"}\n\n"],
    ));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new().user("go")).await;
    assert_eq!(outcome.contents, vec!["a", "c"]);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.completions, 1);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_http_error() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_json_response(
        CHAT_STREAM,
        400,
        json!({"detail": "no user message"}),
    ));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new()).await;
    assert!(outcome.contents.is_empty());
    assert_eq!(outcome.errors, vec![ApiError::new("no user message", 400)]);
    assert_eq!(outcome.completions, 0);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_missing_body() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_missing_body(CHAT_STREAM, 200));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new().user("go")).await;
    assert_eq!(outcome.errors, vec![ApiError::new(UNREADABLE_STREAM_DETAIL, 500)]);
    assert_eq!(outcome.completions, 0);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_read_error_mid_stream() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_read_error(
        CHAT_STREAM,
        200,
        vec!["data: {\"content\":\"partial\"}\n\ndata: {\"con"],
        "connection reset",
    ));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new().user("go")).await;
    assert_eq!(outcome.contents, vec!["partial"]);
    assert_eq!(outcome.errors, vec![ApiError::new("connection reset", 500)]);
    assert_eq!(outcome.completions, 0);
    Ok(())
}

#[tokio::test]
async fn test_send_chat_message_unreachable() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_unreachable(CHAT_STREAM, "connection refused"));
    let client = client_with(&transport)?;

    let outcome = run_chat(&client, ChatRequest::new().user("go")).await;
    assert!(outcome.contents.is_empty());
    assert_eq!(outcome.errors, vec![ApiError::new("connection refused", 500)]);
    assert_eq!(outcome.completions, 0);
    Ok(())
}

#[tokio::test]
async fn test_chat_stream_collect_content() -> Result<()> {
    let transport = Arc::new(MockTransport::new().with_stream_response(
        CHAT_STREAM,
        200,
        vec!["data: {\"content\":\"에코 \"}\n\n", "data: {\"content\":\"응답\"}\n\n"],
    ));
    let client = client_with(&transport)?;

    let text = client
        .chat_stream(ChatRequest::new().user("응답"))
        .await?
        .collect_content()
        .await?;
    assert_eq!(text, "에코 응답");
    Ok(())
}
