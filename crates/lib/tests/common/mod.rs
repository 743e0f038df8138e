//! Shared test support: a scripted chat backend that counts calls, and a
//! minimal catalog HTTP stub.

#![allow(dead_code)]

use async_trait::async_trait;
use lib::llm::{
    ChatBackend, ChatChoice, ChatMessage, ChatResponse, LlmError, ToolCall, ToolCallFunction,
    ToolDefinition,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Assistant response with plain text.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        choices: vec![ChatChoice {
            message: ChatMessage::assistant(text),
        }],
    }
}

/// Assistant response carrying one tool call.
pub fn tool_call_response(name: &str, arguments: serde_json::Value) -> ChatResponse {
    let mut message = ChatMessage::assistant("");
    message.tool_calls = Some(vec![ToolCall {
        id: "call_1".to_string(),
        typ: "function".to_string(),
        function: ToolCallFunction {
            name: name.to_string(),
            arguments,
        },
    }]);
    ChatResponse {
        choices: vec![ChatChoice { message }],
    }
}

/// Scripted [`ChatBackend`]: pops one prepared response per call and counts
/// calls. Running out of script is an API error.
#[derive(Clone)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<ChatResponse>>>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn chat(
        &self,
        _model: &str,
        _messages: Vec<ChatMessage>,
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| LlmError::Api("no scripted response left".to_string()))
    }
}

pub const PRODUCTS_JSON: &str = r#"[
  {"id":1,"name":"Camiseta","description":"Camiseta lisa","talla":"M","color":"rojo","price":500.0,"stock":10,"disponible":true,"categoria":"remeras"},
  {"id":2,"name":"Chaqueta","description":"Chaqueta de jean","talla":"L","color":"azul","price":1200.0,"stock":3,"disponible":true,"categoria":"abrigos"}
]"#;

/// Serve `body` as JSON for every request on a free port; returns the base
/// URL. The accept loop runs until the test process exits.
pub async fn spawn_catalog_stub(body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                // One read is enough for these small GET/POST heads.
                let _ = socket.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(resp.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Base URL no server listens on, for exercising upstream-failure paths.
pub fn dead_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    drop(listener);
    format!("http://{}", addr)
}
