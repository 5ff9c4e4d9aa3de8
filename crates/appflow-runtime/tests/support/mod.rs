//! Scripted in-memory backend for runtime tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use appflow_runtime::{AutoSaveConfig, FetchError, FetchResult, Fetcher, Runtime, RuntimeConfig};
use serde_json::{Value, json};

pub const BASE: &str = "https://app.test/org/app";
pub const INSTANCE: &str = "512/abc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A request the backend received.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Answers requests from scripted responses.
///
/// Each route holds a queue of answers; the last one repeats. Unscripted
/// routes answer `404`. Every request yields once before answering so
/// concurrent members interleave.
#[derive(Debug, Default)]
pub struct Backend {
    routes: Mutex<HashMap<(Method, String), VecDeque<FetchResult<Value>>>>,
    calls: Mutex<Vec<Call>>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, answer: FetchResult<Value>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url(path)))
            .or_default()
            .push_back(answer);
        self
    }

    /// Replace every scripted answer of a route.
    pub fn route(&self, method: Method, path: &str, answer: FetchResult<Value>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method, url(path)), VecDeque::from([answer]));
        self
    }

    pub fn serve(&self, path: &str, body: Value) -> &Self {
        self.on(Method::Get, path, Ok(body))
    }

    pub fn fail(&self, method: Method, path: &str, status: u16, body: Option<Value>) -> &Self {
        self.on(method, path, Err(FetchError::status(status, body)))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        let target = url(path);
        self.calls()
            .iter()
            .filter(|call| call.method == method && call.url == target)
            .count()
    }

    async fn respond(&self, method: Method, url: &str, body: Option<Value>) -> FetchResult<Value> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            body,
        });
        let mut routes = self.routes.lock().unwrap();
        let Some(answers) = routes.get_mut(&(method, url.to_string())) else {
            return Err(FetchError::status(404, None));
        };
        if answers.len() > 1 {
            answers.pop_front().unwrap_or_else(|| Err(FetchError::status(404, None)))
        } else {
            answers.front().cloned().unwrap_or_else(|| Err(FetchError::status(404, None)))
        }
    }
}

impl Fetcher for Backend {
    fn get(&self, url: &str) -> impl Future<Output = FetchResult<Value>> + Send {
        self.respond(Method::Get, url, None)
    }

    fn post(&self, url: &str, body: Option<&Value>) -> impl Future<Output = FetchResult<Value>> + Send {
        self.respond(Method::Post, url, body.cloned())
    }

    fn put(&self, url: &str, body: &Value) -> impl Future<Output = FetchResult<Value>> + Send {
        self.respond(Method::Put, url, Some(body.clone()))
    }
}

/// Absolute URL for a path below the app root.
pub fn url(path: &str) -> String {
    format!("{BASE}/{}", path.trim_start_matches('/'))
}

pub fn instance_path(rest: &str) -> String {
    format!("instances/{INSTANCE}/{rest}")
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig {
        base_url: BASE.to_string(),
        instance: Some(INSTANCE.to_string()),
        language: "en".to_string(),
        auto_save: AutoSaveConfig::disabled(),
        ..RuntimeConfig::default()
    }
}

pub fn data_process() -> Value {
    json!({ "currentTask": { "elementId": "Task_1", "altinnTaskType": "data" } })
}

pub fn confirm_process() -> Value {
    json!({ "currentTask": { "elementId": "Task_2", "altinnTaskType": "confirmation" } })
}

pub fn schema() -> Value {
    json!({
        "info": { "rootNode": "#/definitions/Model" },
        "definitions": {
            "Model": {
                "properties": {
                    "Person": {
                        "properties": {
                            "Name": { "type": "string" },
                            "Age": { "type": "integer", "minimum": 0 }
                        }
                    },
                    "Items": {
                        "type": "array",
                        "items": { "properties": { "Amount": { "type": "integer" } } }
                    }
                }
            }
        }
    })
}

pub fn layout() -> Value {
    json!({
        "data": {
            "layout": [
                {
                    "id": "name",
                    "type": "Input",
                    "required": true,
                    "dataModelBindings": { "simpleBinding": "Person.Name" },
                    "textResourceBindings": { "title": "name.title" }
                },
                {
                    "id": "age",
                    "type": "Input",
                    "dataModelBindings": { "simpleBinding": "Person.Age" }
                },
                {
                    "id": "items",
                    "type": "Group",
                    "maxCount": 5,
                    "children": ["amount"],
                    "dataModelBindings": { "group": "Items" }
                },
                {
                    "id": "amount",
                    "type": "Input",
                    "dataModelBindings": { "simpleBinding": "Items.Amount" }
                }
            ]
        }
    })
}

/// Script a data task on `Task_1` with form data `form`.
///
/// Layout sets, rules and dynamics are absent and answer `404`.
pub fn data_app(form: Value) -> Arc<Backend> {
    let backend = Backend::new();
    backend
        .serve(
            "api/v1/applicationmetadata",
            json!({
                "id": "org/app",
                "dataTypes": [
                    { "id": "model", "taskId": "Task_1", "appLogic": { "classRef": "Model" } },
                    { "id": "ref-data", "taskId": null }
                ]
            }),
        )
        .serve(
            "api/v1/texts/en",
            json!({
                "language": "en",
                "resources": [{ "id": "name.title", "value": "Name" }]
            }),
        )
        .serve(
            &format!("instances/{INSTANCE}"),
            json!({
                "id": INSTANCE,
                "appId": "org/app",
                "instanceOwner": { "partyId": "512" },
                "data": [{ "id": "d1", "dataType": "model" }]
            }),
        )
        .serve(&instance_path("process"), data_process())
        .serve(&instance_path("data/d1"), form)
        .on(Method::Put, &instance_path("data/d1"), Ok(json!({})))
        .serve("api/jsonschema/model", schema())
        .serve("api/layouts", layout())
        .serve("api/layoutsettings", json!({ "pages": { "order": ["FormLayout"] } }));
    backend
}

pub fn runtime(backend: &Arc<Backend>) -> Runtime<Arc<Backend>> {
    Runtime::new(Arc::clone(backend), config())
}
