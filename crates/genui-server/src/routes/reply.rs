use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use genui::{
    agent::Agent,
    models::message::Message,
    protocol::{FinishReason, Frame, StreamUsage, STREAM_HEADER, STREAM_VERSION},
};
use serde::Deserialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

/// How often the relay checks for a departed client while the model is busy.
const HEARTBEAT: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
}

// Streams encoded frames as the response body
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header(STREAM_HEADER, STREAM_VERSION)
            .body(body)
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build stream response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })
    }
}

/// Ends a failed response: the error, then a finish so the client never waits on a
/// half-open turn.
async fn send_failure(tx: &mpsc::Sender<String>, message: String) {
    let _ = tx.send(Frame::Error(message).encode()).await;
    let _ = tx
        .send(
            Frame::FinishMessage {
                finish_reason: FinishReason::Error,
                usage: StreamUsage::default(),
            }
            .encode(),
        )
        .await;
}

/// Forward the agent's events to the response channel one frame at a time.
///
/// Stops as soon as the client is gone: the agent stream is dropped, so no further model
/// call or tool executor runs.
pub async fn relay(agent: Arc<Agent>, messages: Vec<Message>, tx: mpsc::Sender<String>) {
    let workflow = agent.config().name.clone();
    let mut stream = match agent.reply(&messages).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(workflow = %workflow, "Failed to start reply stream: {}", e);
            send_failure(&tx, e.to_string()).await;
            return;
        }
    };

    loop {
        match timeout(HEARTBEAT, stream.next()).await {
            Ok(Some(Ok(event))) => {
                if tx.send(Frame::from(event).encode()).await.is_err() {
                    tracing::info!(workflow = %workflow, outcome = "cancelled", "client disconnected");
                    break;
                }
            }
            Ok(Some(Err(e))) => {
                tracing::error!(workflow = %workflow, outcome = "transport_error", "Error processing reply: {}", e);
                send_failure(&tx, e.to_string()).await;
                break;
            }
            Ok(None) => break,
            Err(_) => {
                // Heartbeat, used to detect disconnected clients and then end running tools.
                if tx.is_closed() {
                    tracing::info!(workflow = %workflow, outcome = "cancelled", "client disconnected");
                    break;
                }
            }
        }
    }
}

fn start(
    agent: Arc<Agent>,
    headers: &HeaderMap,
    request: ChatRequest,
) -> Result<SseResponse, StatusCode> {
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "data").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let (tx, rx) = mpsc::channel(100);
    tracing::debug!(
        workflow = %agent.config().name,
        messages = request.messages.len(),
        "starting reply"
    );
    tokio::spawn(relay(agent, request.messages, tx));

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    start(state.chat, &headers, request)
}

async fn dcm_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    start(state.dcm, &headers, request)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/dcm/chat", post(dcm_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use genui::providers::{
        base::ModelResponse,
        mock::{MockProvider, MockTurn},
    };
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(provider: MockProvider) -> Router {
        let state = AppState::new(Arc::new(provider), 5, 10, None).unwrap();
        routes(state)
    }

    fn chat_request(uri: &str, protocol: Option<&str>) -> http::Request<Body> {
        let body = json!({
            "messages": [{"id": "m1", "role": "user", "content": "Hello"}]
        });
        let mut builder = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(protocol) = protocol {
            builder = builder.header("x-protocol", protocol);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn frames(response: Response) -> Vec<Frame> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|line| Frame::parse(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_chat_streams_frames() {
        let app = app(MockProvider::new(vec![ModelResponse::text("Hi there")]));
        let response = app
            .oneshot(chat_request("/api/chat", Some("data")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()[STREAM_HEADER], "v1");

        let frames = frames(response).await;
        assert!(matches!(frames[0], Frame::StartStep { .. }));
        assert_eq!(frames[1], Frame::Text("Hi there".to_string()));
        assert!(matches!(
            frames.last(),
            Some(Frame::FinishMessage {
                finish_reason: FinishReason::Stop,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_rejects_other_protocols() {
        let app = app(MockProvider::default());
        let response = app
            .oneshot(chat_request("/api/chat", Some("text")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dcm_tool_results_are_streamed() {
        let app = app(MockProvider::new(vec![
            ModelResponse::default().with_tool_request(
                "call_1",
                "get_issuer_deals",
                json!({"issuerId": "bmw-ag", "limit": 2}),
            ),
            ModelResponse::text("BMW has priced two recent deals."),
        ]));
        let response = app
            .oneshot(chat_request("/api/dcm/chat", None))
            .await
            .unwrap();
        let frames = frames(response).await;

        let result = frames.iter().find_map(|f| match f {
            Frame::ToolResult {
                tool_call_id,
                result,
            } if tool_call_id == "call_1" => Some(result.clone()),
            _ => None,
        });
        let result = result.expect("tool result frame");
        assert_eq!(result["deals"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_ends_with_error_frame() {
        let app = app(MockProvider::scripted(vec![MockTurn::Fail(
            "Server error: 429 Too Many Requests".to_string(),
        )]));
        let response = app
            .oneshot(chat_request("/api/chat", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frames = frames(response).await;
        let n = frames.len();
        assert_eq!(
            frames[n - 2],
            Frame::Error("Server error: 429 Too Many Requests".to_string())
        );
        assert!(matches!(
            frames[n - 1],
            Frame::FinishMessage {
                finish_reason: FinishReason::Error,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_relay_stops_when_client_leaves() {
        let provider = MockProvider::repeating(ModelResponse::default().with_tool_request(
            "",
            "get_market_deals",
            json!({}),
        ));
        let state = AppState::new(Arc::new(provider.clone()), 5, 10, None).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        relay(state.dcm, vec![Message::user().with_text("go")], tx).await;
        assert!(provider.calls().await <= 1);
    }

    #[tokio::test]
    async fn test_relay_stops_executors_when_client_leaves_mid_stream() {
        use genui::agent::AgentConfig;
        use genui::registry::{ToolDefinition, ToolRegistry};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let executions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executions);
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::server(
                "lookup",
                "Counts its executions",
                json!({"type": "object"}),
                move |_| Ok(json!({"runs": counter.fetch_add(1, Ordering::SeqCst) + 1})),
            ))
            .unwrap();

        let provider =
            MockProvider::repeating(ModelResponse::default().with_tool_request("", "lookup", json!({})));
        let agent = Arc::new(Agent::new(
            Arc::new(provider.clone()),
            registry,
            "Look things up.".to_string(),
            AgentConfig::new("test", 50),
        ));

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(relay(agent, vec![Message::user().with_text("go")], tx));

        // read until the first server tool has run, then leave
        while let Some(line) = rx.recv().await {
            if matches!(Frame::parse(line.trim_end()).unwrap(), Frame::ToolResult { .. }) {
                break;
            }
        }
        let ran_before_leaving = executions.load(Ordering::SeqCst);
        drop(rx);

        timeout(Duration::from_secs(5), handle)
            .await
            .expect("relay should stop after the client leaves")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ran_before_leaving, 1);
        assert_eq!(executions.load(Ordering::SeqCst), ran_before_leaving);
        assert!(provider.calls().await <= 2);
    }
}
