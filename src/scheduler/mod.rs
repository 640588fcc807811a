//! Message scheduler (C7): dependency-tagged ordering plus the
//! cancellation lane.

mod cancellation;
mod reply;

pub use cancellation::{CancellationLane, CancellationToken};
pub use reply::ReplyHandle;

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value as Json;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::framing::{read_message, write_message};
use crate::document::DocumentUri;
use crate::error::{CoreError, CoreResult};

/// The dependency class an inbound message is classified under (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTag {
    GlobalConfig,
    DocumentUpdate(DocumentUri),
    DocumentRequest(DocumentUri),
    Freestanding,
}

/// Enforces the dependency relation between scheduled tasks:
/// global-config is a total barrier; a document-update of U barriers
/// against any document-update/request of U; document-requests of the
/// same URI never block each other; freestanding blocks on nothing but
/// global-config.
///
/// Implemented with a global `RwLock` (write = global-config, read =
/// everything else) plus one per-URI `RwLock` (write = document-update,
/// read = document-request). The design notes suggest a head-of-queue
/// pointer per URI instead of a lock so cancellation never blocks on
/// it; here cancellation is entirely out of band (`CancellationLane`
/// never touches these gates), so the simpler lock-based gate is
/// equivalent for this scheduler's purposes.
pub struct Scheduler {
    global_gate: RwLock<()>,
    uri_gates: DashMap<DocumentUri, Arc<RwLock<()>>>,
    pub cancellation: CancellationLane,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            global_gate: RwLock::new(()),
            uri_gates: DashMap::new(),
            cancellation: CancellationLane::new(),
        })
    }

    fn uri_gate(&self, uri: &DocumentUri) -> Arc<RwLock<()>> {
        self.uri_gates.entry(uri.clone()).or_insert_with(|| Arc::new(RwLock::new(()))).clone()
    }

    /// Applies `tag`'s dependency relation around `task`'s execution.
    /// Suspension inside `task` (backend channel, index, document
    /// manager) still counts as in-progress for dependency purposes,
    /// because the gate guard is held across the whole `.await`.
    async fn run_gated<F, Fut, T>(scheduler: Arc<Self>, tag: DependencyTag, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match tag {
            DependencyTag::GlobalConfig => {
                let _guard = scheduler.global_gate.write().await;
                task().await
            }
            DependencyTag::DocumentUpdate(uri) => {
                let _global = scheduler.global_gate.read().await;
                let gate = scheduler.uri_gate(&uri);
                let _uri_guard = gate.write().await;
                task().await
            }
            DependencyTag::DocumentRequest(uri) => {
                let _global = scheduler.global_gate.read().await;
                let gate = scheduler.uri_gate(&uri);
                let _uri_guard = gate.read().await;
                task().await
            }
            DependencyTag::Freestanding => {
                let _global = scheduler.global_gate.read().await;
                task().await
            }
        }
    }

    /// Schedules `task` under `tag`'s dependency relation and runs it on
    /// a worker task, returning a handle to its result. Used for
    /// notifications, which carry no wire request id and so are never
    /// cancellable (§4.1's cancellation lane only tracks requests).
    pub fn schedule<F, Fut, T>(self: &Arc<Self>, tag: DependencyTag, task: F) -> JoinHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let scheduler = Arc::clone(self);
        tokio::spawn(Self::run_gated(scheduler, tag, task))
    }

    /// Schedules a cancellable request: claims the next token the
    /// transport-level sniffer published (see [`intercept`]) and races
    /// `task` against it, replying with [`CoreError::Cancelled`] if the
    /// token fires first. The reply is routed through a [`ReplyHandle`]
    /// so a handler that is dropped mid-flight (a panic unwinding
    /// through the spawned task) trips its drop-without-reply assertion
    /// rather than silently never replying.
    ///
    /// There is no wire id threaded into this call — `tower_lsp`'s
    /// `LanguageServer` trait does not expose one to handler methods —
    /// so this relies on requests reaching `schedule_cancellable` in the
    /// same relative order the sniffer read them off the wire, which
    /// holds here because every request-class handler calls it as its
    /// first suspension point.
    pub fn schedule_cancellable<F, Fut, T>(
        self: &Arc<Self>,
        tag: DependencyTag,
        task: F,
    ) -> impl Future<Output = CoreResult<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let scheduler = Arc::clone(self);
        let claimed = scheduler.cancellation.claim_next();
        let (reply, receiver) = ReplyHandle::new();
        tokio::spawn(async move {
            let gated = Self::run_gated(scheduler.clone(), tag, task);
            let result = match claimed {
                Some((id, token)) => {
                    let outcome = tokio::select! {
                        result = gated => result,
                        _ = token.cancelled() => Err(CoreError::Cancelled),
                    };
                    scheduler.cancellation.complete(id);
                    outcome
                }
                None => gated.await,
            };
            reply.reply(result);
        });
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(CoreError::Dispatch("reply handle dropped without a reply".into())))
        }
    }
}

/// Wraps `reader` so that `$/cancelRequest` notifications are detected
/// and routed to `scheduler`'s cancellation lane before being forwarded
/// unchanged; every other framed message passes straight through. Used
/// by each transport in `main.rs`, since `tower_lsp::Server` itself has
/// no extension point for inspecting a message ahead of routing it.
pub fn intercept(
    scheduler: Arc<Scheduler>,
    reader: impl AsyncRead + Unpin + Send + 'static,
) -> impl AsyncRead + Unpin + Send + 'static {
    let (writer, sniffed) = tokio::io::duplex(64 * 1024);
    tokio::spawn(sniff_loop(scheduler, reader, writer));
    sniffed
}

async fn sniff_loop(scheduler: Arc<Scheduler>, reader: impl AsyncRead + Unpin, mut writer: impl AsyncWrite + Unpin) {
    let mut buffered = BufReader::new(reader);
    loop {
        let body = match read_message(&mut buffered).await {
            Ok(Some(body)) => body,
            _ => return,
        };
        inspect(&scheduler, &body);
        if write_message(&mut writer, &body).await.is_err() {
            return;
        }
    }
}

fn inspect(scheduler: &Arc<Scheduler>, body: &[u8]) {
    let Ok(value) = serde_json::from_slice::<Json>(body) else { return };
    match value.get("method").and_then(Json::as_str) {
        Some("$/cancelRequest") => {
            if let Some(id) = value.get("params").and_then(|p| p.get("id")).and_then(Json::as_i64) {
                debug!(id, "cancel request observed on the wire");
                scheduler.cancellation.cancel(id);
            }
        }
        Some(_) => {
            if let Some(id) = value.get("id").and_then(Json::as_i64) {
                scheduler.cancellation.publish(id);
            }
        }
        None => {}
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { global_gate: RwLock::new(()), uri_gates: DashMap::new(), cancellation: CancellationLane::new() }
    }
}

/// Classifies an LSP method name into its dependency tag (§4.1). URIs
/// for document-scoped methods must be supplied by the caller, since
/// they come from the request params, not the method name.
pub fn classify(method: &str) -> MethodClass {
    match method {
        "initialize" | "shutdown" | "exit" | "$/setTrace" | "workspace/didChangeConfiguration"
        | "workspace/didChangeWorkspaceFolders" | "client/registerCapability" | "client/unregisterCapability" => {
            MethodClass::GlobalConfig
        }
        "textDocument/didOpen" | "textDocument/didChange" | "textDocument/didClose" | "textDocument/didSave"
        | "textDocument/willSave" | "notebookDocument/didOpen" | "notebookDocument/didChange"
        | "notebookDocument/didClose" => MethodClass::DocumentUpdate,
        m if m.starts_with("textDocument/") => MethodClass::DocumentRequest,
        "workspace/executeCommand" => MethodClass::DocumentRequest,
        _ => MethodClass::Freestanding,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    GlobalConfig,
    DocumentUpdate,
    DocumentRequest,
    Freestanding,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn uri(s: &str) -> DocumentUri {
        DocumentUri::parse(s).unwrap()
    }

    #[test]
    fn method_classification_matches_spec_buckets() {
        assert_eq!(classify("initialize"), MethodClass::GlobalConfig);
        assert_eq!(classify("textDocument/didChange"), MethodClass::DocumentUpdate);
        assert_eq!(classify("textDocument/hover"), MethodClass::DocumentRequest);
        assert_eq!(classify("$/cancelRequest"), MethodClass::Freestanding);
    }

    #[tokio::test]
    async fn document_requests_for_same_uri_run_concurrently() {
        let scheduler = Scheduler::new();
        let u = uri("file:///a.swift");
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(scheduler.schedule(DependencyTag::DocumentRequest(u.clone()), move || async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn document_update_excludes_concurrent_requests_of_same_uri() {
        let scheduler = Scheduler::new();
        let u = uri("file:///a.swift");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order1 = order.clone();
        let update = scheduler.schedule(DependencyTag::DocumentUpdate(u.clone()), move || async move {
            order1.lock().push("update-start");
            tokio::time::sleep(Duration::from_millis(20)).await;
            order1.lock().push("update-end");
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        let order2 = order.clone();
        let request = scheduler.schedule(DependencyTag::DocumentRequest(u.clone()), move || async move {
            order2.lock().push("request-start");
        });

        update.await.unwrap();
        request.await.unwrap();
        let recorded = order.lock().clone();
        assert_eq!(recorded, vec!["update-start", "update-end", "request-start"]);
    }
}
