//! Tests for queue fulfilment, error policy and per-task member sets.

mod support;

use std::collections::BTreeSet;

use appflow_runtime::{
    FetchError, Member, QueueError, QueueEvent, QueueKind, RuntimeConfig, RuntimeError, SaveOutcome,
};
use serde_json::json;
use support::{BASE, Backend, Method, confirm_process, data_app, instance_path, layout, runtime, schema};
use tokio::sync::broadcast::Receiver;

fn drain(events: &mut Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

// =============================================================================
// Fulfilment
// =============================================================================

#[tokio::test]
async fn test_fulfilled_follows_every_member() {
    let backend = data_app(json!({ "Person": { "Name": "Kari" } }));
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();
    let mut events = runtime.subscribe(QueueKind::DataTask);

    runtime.start_queue_for_current_task().await.unwrap();

    let received = drain(&mut events);
    let (last, members) = received.split_last().unwrap();
    assert_eq!(*last, QueueEvent::Fulfilled { kind: QueueKind::DataTask });

    let fulfilled: Vec<Member> = members
        .iter()
        .map(|event| match event {
            QueueEvent::MemberFulfilled { member, .. } => *member,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    let unique: BTreeSet<Member> = fulfilled.iter().copied().collect();
    assert_eq!(fulfilled.len(), QueueKind::DataTask.members().len());
    assert_eq!(unique, QueueKind::DataTask.members().iter().copied().collect());
}

#[tokio::test]
async fn test_restart_does_not_fulfil_twice() {
    let backend = data_app(json!({}));
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();
    let mut events = runtime.subscribe(QueueKind::DataTask);

    runtime.start_queue(QueueKind::DataTask).await.unwrap();
    runtime.start_queue(QueueKind::DataTask).await.unwrap();

    let fulfilled = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, QueueEvent::Fulfilled { .. }))
        .count();
    assert_eq!(fulfilled, 1);
}

// =============================================================================
// Error policy
// =============================================================================

#[tokio::test]
async fn test_forbidden_form_data_is_missing_roles() {
    let backend = data_app(json!({}));
    backend.route(
        Method::Get,
        &instance_path("data/d1"),
        Err(FetchError::status(403, None)),
    );
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();
    let mut events = runtime.subscribe(QueueKind::DataTask);

    let err = runtime.start_queue_for_current_task().await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Queue(QueueError::MissingRoles { resource: "form data" })
    ));

    let state = runtime.queue_state(QueueKind::DataTask);
    assert_eq!(state.is_done, Some(false));
    assert!(state.error.is_some());
    let received = drain(&mut events);
    assert!(matches!(received.last(), Some(QueueEvent::Failed { .. })));
    assert!(!received.iter().any(|event| matches!(event, QueueEvent::Fulfilled { .. })));

    backend.route(Method::Get, &instance_path("data/d1"), Ok(json!({})));
    assert!(runtime.start_queue(QueueKind::DataTask).await.unwrap());
    assert_eq!(runtime.queue_state(QueueKind::DataTask).is_done, Some(true));
}

#[tokio::test]
async fn test_missing_schema_is_fatal() {
    let backend = data_app(json!({}));
    backend.route(Method::Get, "api/jsonschema/model", Err(FetchError::status(404, None)));
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();

    let err = runtime.start_queue_for_current_task().await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Queue(QueueError::NotFound { resource: "data model schema" })
    ));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_server_error_is_recoverable() {
    let backend = data_app(json!({}));
    backend.route(Method::Get, "api/layouts", Err(FetchError::status(500, None)));
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();

    let err = runtime.start_queue_for_current_task().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Queue(QueueError::Member { resource: "layout", .. })));
    assert!(err.is_recoverable());
}

// =============================================================================
// Info and stateless queues
// =============================================================================

#[tokio::test]
async fn test_info_task_resolves_text_variables() {
    let backend = data_app(json!({ "Person": { "Name": "Kari" } }));
    backend
        .route(Method::Get, &instance_path("process"), Ok(confirm_process()))
        .route(
            Method::Get,
            "api/v1/texts/en",
            Ok(json!({
                "language": "en",
                "resources": [{
                    "id": "receipt.title",
                    "value": "Thanks {0} ({1})",
                    "variables": [
                        { "key": "Person.Name", "dataSource": "dataModel.model" },
                        { "key": "instanceOwnerPartyId", "dataSource": "instanceContext" }
                    ]
                }]
            })),
        );
    let mut runtime = runtime(&backend);
    runtime.initialize().await.unwrap();

    let kind = runtime.start_queue_for_current_task().await.unwrap();
    assert_eq!(kind, QueueKind::InfoTask);

    let state = runtime.state();
    insta::assert_snapshot!(state.texts.resolve("receipt.title"), @"Thanks Kari (512)");
    assert_eq!(state.form_data.get("Person.Name").map(String::as_str), Some("Kari"));
    assert_eq!(backend.count(Method::Get, "api/jsonschema/model"), 0);
}

#[tokio::test]
async fn test_stateless_entry_uses_layout_set_from_metadata() {
    let backend = Backend::new();
    backend
        .serve(
            "api/v1/applicationmetadata",
            json!({
                "id": "org/app",
                "dataTypes": [{ "id": "model", "appLogic": { "classRef": "Model" } }],
                "onEntry": { "show": "public" }
            }),
        )
        .serve("api/v1/texts/en", json!({ "language": "en", "resources": [] }))
        .serve(
            "api/layoutsets",
            json!({ "sets": [{ "id": "public", "dataType": "model", "tasks": [] }] }),
        )
        .serve("api/jsonschema/model", schema())
        .serve("api/layouts/public", layout())
        .on(
            Method::Post,
            "v1/data?dataType=model",
            Ok(json!({ "Person": { "Name": "Anonymous" } })),
        );
    let config = RuntimeConfig {
        base_url: BASE.to_string(),
        language: "en".to_string(),
        ..RuntimeConfig::default()
    };
    let mut runtime = appflow_runtime::Runtime::new(backend.clone(), config);
    runtime.initialize().await.unwrap();

    let kind = runtime.start_queue_for_current_task().await.unwrap();
    assert_eq!(kind, QueueKind::Stateless);

    let state = runtime.state();
    assert_eq!(state.layout_set.as_deref(), Some("public"));
    assert_eq!(state.data_element_id, None);
    assert_eq!(state.form_data.get("Person.Name").map(String::as_str), Some("Anonymous"));
    assert!(state.layout_settings.is_none());
    assert_eq!(runtime.save().await.unwrap(), SaveOutcome::Skipped);
}
