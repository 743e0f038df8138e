//! The bounded tool-calling protocol: call counts, sentinel short-circuit,
//! and the catch-all apology, driven by a scripted backend.

mod common;

use common::{dead_endpoint, spawn_catalog_stub, text_response, tool_call_response, MockBackend, PRODUCTS_JSON};
use lib::agent::{AgentOrchestrator, AGENT_APOLOGY, TOOL_FAILURE_REPLY};
use lib::catalog::CatalogClient;
use lib::history::{format_history, HistoryStore, MemoryHistoryStore};
use lib::tools::default_registry;
use std::sync::Arc;
use std::time::Duration;

async fn orchestrator_with(
    backend: MockBackend,
    base_url: String,
) -> (AgentOrchestrator<MockBackend>, Arc<MemoryHistoryStore>) {
    let catalog = Arc::new(CatalogClient::new(base_url, Duration::from_secs(2)));
    let history = Arc::new(MemoryHistoryStore::new());
    let agent = AgentOrchestrator::new(
        backend,
        "test-model",
        catalog.clone(),
        default_registry(catalog),
        history.clone(),
    );
    (agent, history)
}

#[tokio::test]
async fn tool_free_response_is_terminal_after_one_call() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    let backend = MockBackend::new(vec![text_response("¡Claro! ¿Qué talla buscás?")]);
    let (agent, _) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "busco camisetas").await;
    assert_eq!(reply, "¡Claro! ¿Qué talla buscás?");
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn happy_tool_path_makes_exactly_two_calls() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    let backend = MockBackend::new(vec![
        tool_call_response("getProducts", serde_json::json!({"query": "camiseta"})),
        text_response("Tengo esta camiseta (ID: 1), cuesta $500."),
    ]);
    let (agent, history) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "qué camisetas tienes?").await;
    assert_eq!(reply, "Tengo esta camiseta (ID: 1), cuesta $500.");
    assert_eq!(backend.call_count(), 2);

    // Turn was recorded: user text plus the final reply, in order.
    let entries = format_history(history.get("u1").await.unwrap());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, "user");
    assert_eq!(entries[0].content, "qué camisetas tienes?");
    assert_eq!(entries[1].role, "assistant");
}

#[tokio::test]
async fn string_encoded_tool_arguments_are_accepted() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    let backend = MockBackend::new(vec![
        tool_call_response(
            "getProducts",
            serde_json::Value::String(r#"{"query":"chaqueta"}"#.to_string()),
        ),
        text_response("Tengo esta chaqueta (ID: 2)."),
    ]);
    let (agent, _) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "busco abrigos").await;
    assert_eq!(reply, "Tengo esta chaqueta (ID: 2).");
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn sentinel_tool_result_skips_the_second_call() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    // Invalid product id: the handler produces a sentinel without any request.
    let backend = MockBackend::new(vec![tool_call_response(
        "getProductById",
        serde_json::json!({"id": -5}),
    )]);
    let (agent, _) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "detalles del producto").await;
    assert_eq!(reply, TOOL_FAILURE_REPLY);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn unknown_tool_is_never_invoked() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    let backend = MockBackend::new(vec![tool_call_response(
        "dropAllTables",
        serde_json::json!({}),
    )]);
    let (agent, _) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "haz algo raro").await;
    assert_eq!(reply, TOOL_FAILURE_REPLY);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn schema_mismatch_is_a_hard_failure_without_retry() {
    let base = spawn_catalog_stub(PRODUCTS_JSON).await;
    // createCart without its required "items" field.
    let backend = MockBackend::new(vec![tool_call_response(
        "createCart",
        serde_json::json!({"productos": [{"product_id": 1, "qty": 2}]}),
    )]);
    let (agent, _) = orchestrator_with(backend.clone(), base).await;

    let reply = agent.reply("u1", "comprar").await;
    assert_eq!(reply, TOOL_FAILURE_REPLY);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn catalog_outage_becomes_the_fixed_apology() {
    // Nothing listens here: the prompt-context fetch fails before any model call.
    let backend = MockBackend::new(vec![text_response("nunca usado")]);
    let (agent, _) = orchestrator_with(backend.clone(), dead_endpoint()).await;

    let reply = agent.reply("u1", "busco camisetas").await;
    assert_eq!(reply, AGENT_APOLOGY);
    assert_eq!(backend.call_count(), 0);
}
