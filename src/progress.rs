//! Work-done progress (C10): a debounced active-task counter that
//! begins/ends a single progress token on the client.

use async_trait::async_trait;
use parking_lot::Mutex;
use tower_lsp::lsp_types::{
    NumberOrString, ProgressParams, ProgressParamsValue, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressCreateParams, WorkDoneProgressEnd,
};
use tower_lsp::Client;
use tracing::warn;

use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NoProgress,
    Creating,
    Created,
    Failed,
}

/// The client-facing half of progress reporting, abstracted so tests
/// can substitute a fake without a real `tower_lsp::Client`.
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    async fn create(&self, token: &str) -> CoreResult<()>;
    async fn begin(&self, token: &str, title: &str);
    async fn end(&self, token: &str);
}

pub struct ClientProgressTransport {
    client: Client,
}

impl ClientProgressTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressTransport for ClientProgressTransport {
    async fn create(&self, token: &str) -> CoreResult<()> {
        self.client
            .send_request::<tower_lsp::lsp_types::request::WorkDoneProgressCreate>(WorkDoneProgressCreateParams {
                token: NumberOrString::String(token.to_string()),
            })
            .await
            .map_err(|err| crate::error::CoreError::Dispatch(err.to_string()))
    }

    async fn begin(&self, token: &str, title: &str) {
        self.client
            .send_notification::<tower_lsp::lsp_types::notification::Progress>(ProgressParams {
                token: NumberOrString::String(token.to_string()),
                value: ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(WorkDoneProgressBegin {
                    title: title.to_string(),
                    cancellable: Some(false),
                    message: None,
                    percentage: None,
                })),
            })
            .await;
    }

    async fn end(&self, token: &str) {
        self.client
            .send_notification::<tower_lsp::lsp_types::notification::Progress>(ProgressParams {
                token: NumberOrString::String(token.to_string()),
                value: ProgressParamsValue::WorkDone(WorkDoneProgress::End(WorkDoneProgressEnd { message: None })),
            })
            .await;
    }
}

struct Inner {
    state: State,
    active_tasks: u32,
}

/// One progress token's state machine (§4.9). A server that reports
/// more than one concurrent activity kind owns one `WorkDoneProgress`
/// per kind.
pub struct WorkDoneProgress_ {
    token: String,
    title: String,
    transport: Box<dyn ProgressTransport>,
    inner: Mutex<Inner>,
}

impl WorkDoneProgress_ {
    pub fn new(token: impl Into<String>, title: impl Into<String>, transport: Box<dyn ProgressTransport>) -> Self {
        Self {
            token: token.into(),
            title: title.into(),
            transport,
            inner: Mutex::new(Inner { state: State::NoProgress, active_tasks: 0 }),
        }
    }

    /// Increments the active-task counter. On the 0->1 transition,
    /// issues `create-work-done-progress` and, if it succeeds, emits
    /// `begin`. If the counter already dropped back to 0 by the time
    /// creation completes, `end` is emitted immediately instead.
    pub async fn start(&self) {
        let should_create = {
            let mut inner = self.inner.lock();
            if inner.state == State::Failed {
                inner.active_tasks += 1;
                return;
            }
            inner.active_tasks += 1;
            let should_create = inner.active_tasks == 1 && inner.state == State::NoProgress;
            if should_create {
                inner.state = State::Creating;
            }
            should_create
        };
        if !should_create {
            return;
        }

        match self.transport.create(&self.token).await {
            Ok(()) => {
                let still_active = {
                    let mut inner = self.inner.lock();
                    inner.state = State::Created;
                    inner.active_tasks > 0
                };
                if still_active {
                    self.transport.begin(&self.token, &self.title).await;
                } else {
                    self.transport.end(&self.token).await;
                }
            }
            Err(err) => {
                warn!(token = %self.token, %err, "work-done progress creation failed; no further attempts");
                self.inner.lock().state = State::Failed;
            }
        }
    }

    /// Decrements the active-task counter; emits `end` if it reaches 0
    /// while in the `Created` state.
    pub async fn end_one(&self) {
        let should_end = {
            let mut inner = self.inner.lock();
            inner.active_tasks = inner.active_tasks.saturating_sub(1);
            inner.active_tasks == 0 && inner.state == State::Created
        };
        if should_end {
            self.inner.lock().state = State::NoProgress;
            self.transport.end(&self.token).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingTransport {
        creates: AtomicUsize,
        begins: AtomicUsize,
        ends: AtomicUsize,
    }

    #[async_trait]
    impl ProgressTransport for Arc<CountingTransport> {
        async fn create(&self, _token: &str) -> CoreResult<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn begin(&self, _token: &str, _title: &str) {
            self.begins.fetch_add(1, Ordering::SeqCst);
        }
        async fn end(&self, _token: &str) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn single_task_creates_begins_and_ends_once() {
        let transport = Arc::new(CountingTransport::default());
        let progress = WorkDoneProgress_::new("t", "Indexing", Box::new(transport.clone()));
        progress.start().await;
        progress.end_one().await;
        assert_eq!(transport.creates.load(Ordering::SeqCst), 1);
        assert_eq!(transport.begins.load(Ordering::SeqCst), 1);
        assert_eq!(transport.ends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlapping_tasks_share_one_begin_end_pair() {
        let transport = Arc::new(CountingTransport::default());
        let progress = WorkDoneProgress_::new("t", "Indexing", Box::new(transport.clone()));
        progress.start().await;
        progress.start().await;
        progress.end_one().await;
        assert_eq!(transport.ends.load(Ordering::SeqCst), 0);
        progress.end_one().await;
        assert_eq!(transport.creates.load(Ordering::SeqCst), 1);
        assert_eq!(transport.ends.load(Ordering::SeqCst), 1);
    }
}
