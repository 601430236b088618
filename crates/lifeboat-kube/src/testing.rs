//! In-memory cluster for service tests.
//!
//! [`MockCluster`] implements [`ResourceApi`] over a map of JSON objects keyed
//! by collection and name. It understands the path shapes the snapshot
//! services use (`kind`, `kind/name`, `kind?labelSelector=k=v`), enforces
//! create/update conflicts by name and `resourceVersion`, and records every
//! call so tests can assert on traffic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lifeboat_core::SnapshotResult;
use reqwest::Method;
use serde_json::{json, Value};

use crate::client::{RawResponse, ResourceApi};
use crate::resources::paths;

/// One request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct StatusOverride {
    method: Method,
    path: String,
    prefix: bool,
    status: u16,
    body: Value,
}

impl StatusOverride {
    fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method
            && if self.prefix {
                path.starts_with(&self.path)
            } else {
                path == self.path
            }
    }
}

#[derive(Debug, Default)]
struct DownloadResponder {
    polls_until_ready: u32,
    url: String,
    polls: HashMap<String, u32>,
}

#[derive(Clone)]
#[allow(clippy::type_complexity)]
pub struct MockCluster {
    namespace: String,
    objects: Arc<Mutex<BTreeMap<(String, String), Value>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    overrides: Arc<Mutex<Vec<StatusOverride>>>,
    download: Arc<Mutex<Option<DownloadResponder>>>,
    resource_version: Arc<AtomicU64>,
}

impl MockCluster {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            overrides: Arc::new(Mutex::new(Vec::new())),
            download: Arc::new(Mutex::new(None)),
            resource_version: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Seed an object into `collection`, assigning a resourceVersion.
    pub fn insert(&self, collection: &str, mut object: Value) {
        let name = object_name(&object);
        object["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        self.objects
            .lock()
            .unwrap()
            .insert((collection.to_string(), name), object);
    }

    pub fn get(&self, collection: &str, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&(collection.to_string(), name.to_string()))
            .cloned()
    }

    pub fn objects(&self, collection: &str) -> Vec<Value> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((kind, _), _)| kind == collection)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Answer `method path` with `status` and `body` instead of the store.
    pub fn respond_with(&self, method: Method, path: &str, status: u16, body: Value) {
        self.overrides.lock().unwrap().push(StatusOverride {
            method,
            path: path.to_string(),
            prefix: false,
            status,
            body,
        });
    }

    /// Like [`Self::respond_with`] for every path starting with `prefix`,
    /// for resources whose names are generated.
    pub fn respond_with_prefix(&self, method: Method, prefix: &str, status: u16, body: Value) {
        self.overrides.lock().unwrap().push(StatusOverride {
            method,
            path: prefix.to_string(),
            prefix: true,
            status,
            body,
        });
    }

    /// Populate `status.downloadURL` of every download request once it has
    /// been read `polls` times.
    pub fn serve_download_url_after(&self, polls: u32, url: &str) {
        *self.download.lock().unwrap() = Some(DownloadResponder {
            polls_until_ready: polls,
            url: url.to_string(),
            polls: HashMap::new(),
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls with `method` whose path starts with `path_prefix`.
    pub fn count_calls(&self, method: Method, path_prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method && call.path.starts_with(path_prefix))
            .count()
    }

    fn next_resource_version(&self) -> String {
        self.resource_version
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    fn list(&self, collection: &str, query: Option<&str>) -> RawResponse {
        let selector = query
            .and_then(|q| q.strip_prefix("labelSelector="))
            .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_default());
        let selector = selector.as_deref().and_then(|s| s.split_once('='));

        let items: Vec<Value> = self
            .objects(collection)
            .into_iter()
            .filter(|object| match selector {
                Some((key, value)) => object["metadata"]["labels"][key] == json!(value),
                None => true,
            })
            .collect();

        respond(200, json!({ "items": items }))
    }

    fn read(&self, collection: &str, name: &str) -> RawResponse {
        let key = (collection.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let Some(object) = objects.get_mut(&key) else {
            return not_found(collection, name);
        };

        if collection == paths::DOWNLOAD_REQUESTS {
            if let Some(responder) = self.download.lock().unwrap().as_mut() {
                let polls = responder.polls.entry(name.to_string()).or_insert(0);
                *polls += 1;
                if *polls >= responder.polls_until_ready {
                    object["status"] = json!({
                        "phase": "Processed",
                        "downloadURL": responder.url,
                    });
                }
            }
        }

        respond(200, object.clone())
    }

    fn create(&self, collection: &str, body: Option<&Value>) -> RawResponse {
        let Some(mut object) = body.cloned() else {
            return respond(400, json!({"message": "request body required"}));
        };
        let name = object_name(&object);
        let key = (collection.to_string(), name.clone());

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return respond(
                409,
                json!({"message": format!("{} \"{}\" already exists", collection, name)}),
            );
        }

        object["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        objects.insert(key, object.clone());
        respond(201, object)
    }

    fn replace(&self, collection: &str, name: &str, body: Option<&Value>) -> RawResponse {
        let Some(mut object) = body.cloned() else {
            return respond(400, json!({"message": "request body required"}));
        };
        let key = (collection.to_string(), name.to_string());

        let mut objects = self.objects.lock().unwrap();
        let Some(current) = objects.get(&key) else {
            return not_found(collection, name);
        };

        let sent = object["metadata"]["resourceVersion"].as_str().map(str::to_string);
        let stored = current["metadata"]["resourceVersion"].as_str();
        if let Some(sent) = sent.as_deref() {
            if Some(sent) != stored {
                return respond(
                    409,
                    json!({"message": format!(
                        "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
                        collection, name
                    )}),
                );
            }
        }

        object["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        objects.insert(key, object.clone());
        respond(200, object)
    }

    fn remove(&self, collection: &str, name: &str) -> RawResponse {
        let key = (collection.to_string(), name.to_string());
        match self.objects.lock().unwrap().remove(&key) {
            Some(_) => respond(200, json!({"status": "Success"})),
            None => not_found(collection, name),
        }
    }
}

fn object_name(object: &Value) -> String {
    object["metadata"]["name"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

fn respond(status: u16, body: Value) -> RawResponse {
    RawResponse { status, body }
}

fn not_found(collection: &str, name: &str) -> RawResponse {
    respond(
        404,
        json!({"message": format!("{} \"{}\" not found", collection, name)}),
    )
}

#[async_trait]
impl ResourceApi for MockCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn unhandled_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> SnapshotResult<RawResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            path: path.to_string(),
            body: body.cloned(),
        });

        let forced = self
            .overrides
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.matches(&method, path))
            .cloned();
        if let Some(forced) = forced {
            return Ok(respond(forced.status, forced.body));
        }

        let (resource, query) = match path.split_once('?') {
            Some((resource, query)) => (resource, Some(query)),
            None => (path, None),
        };
        let (collection, name) = match resource.split_once('/') {
            Some((collection, name)) => (collection, Some(name)),
            None => (resource, None),
        };

        let response = match name {
            None if method == Method::GET => self.list(collection, query),
            None if method == Method::POST => self.create(collection, body),
            Some(name) if method == Method::GET => self.read(collection, name),
            Some(name) if method == Method::PUT => self.replace(collection, name, body),
            Some(name) if method == Method::DELETE => self.remove(collection, name),
            _ => respond(405, json!({"message": "method not allowed"})),
        };

        Ok(response)
    }
}
