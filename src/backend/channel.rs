use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{json, Value as Json};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tracing::{error, warn};

use crate::error::{CoreError, CoreResult};
use crate::payload::{Ident, Value, INTERN_TABLE};

use super::framing::{read_message, write_message};

/// Emitted (via [`BackendChannel::crash_events`]) whenever the backend's
/// transport closes unexpectedly. The service registry (C6) is the
/// subscriber that rebuilds adapters in response.
#[derive(Debug, Clone, Copy)]
pub struct CrashEvent {
    pub generation: u64,
}

struct Pending {
    reply: oneshot::Sender<CoreResult<Value>>,
}

/// One channel per child process. `send`/`send_notification`/`cancel`
/// are the only operations callers need; everything else (framing,
/// demultiplexing by request id, crash detection) is internal.
pub struct BackendChannel {
    name: String,
    stdin: AsyncMutex<ChildStdin>,
    child: AsyncMutex<Child>,
    pending: DashMap<i64, Pending>,
    next_id: AtomicI64,
    crash_tx: watch::Sender<u64>,
}

impl BackendChannel {
    pub async fn spawn(name: impl Into<String>, program: impl AsRef<Path>, args: Vec<String>) -> CoreResult<Arc<Self>> {
        let name = name.into();
        let (stdin, stdout, child) = Self::launch(program.as_ref(), &args).await?;
        let (crash_tx, _crash_rx) = watch::channel(0);
        let channel = Arc::new(Self {
            name,
            stdin: AsyncMutex::new(stdin),
            child: AsyncMutex::new(child),
            pending: DashMap::new(),
            next_id: AtomicI64::new(1),
            crash_tx,
        });
        channel.clone().spawn_reader(stdout);
        Ok(channel)
    }

    async fn launch(program: &Path, args: &[String]) -> CoreResult<(ChildStdin, ChildStdout, Child)> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CoreError::Dispatch("backend process has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::Dispatch("backend process has no stdout".into()))?;
        Ok((stdin, stdout, child))
    }

    fn spawn_reader(self: Arc<Self>, stdout: ChildStdout) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match read_message(&mut reader).await {
                    Ok(Some(body)) => self.dispatch_incoming(&body),
                    Ok(None) => {
                        warn!(backend = %self.name, "backend closed its stdout");
                        self.handle_crash();
                        break;
                    }
                    Err(err) => {
                        error!(backend = %self.name, %err, "backend transport read failed");
                        self.handle_crash();
                        break;
                    }
                }
            }
        });
    }

    fn dispatch_incoming(&self, body: &[u8]) {
        let message: Json = match serde_json::from_slice(body) {
            Ok(message) => message,
            Err(err) => {
                error!(backend = %self.name, %err, "malformed message from backend");
                return;
            }
        };
        let Some(id) = message.get("id").and_then(Json::as_i64) else {
            // Notification from the backend; the core's backends (C4's
            // contract) do not currently push any, so this is dropped.
            return;
        };
        let Some((_, pending)) = self.pending.remove(&id) else {
            warn!(backend = %self.name, id, "reply for unknown or already-resolved request");
            return;
        };
        let result = if let Some(error) = message.get("error") {
            Err(CoreError::Unknown(error.to_string()))
        } else {
            let payload = message.get("result").cloned().unwrap_or(Json::Null);
            Value::from_wire_json(payload).map_err(|err| CoreError::Internal(err.to_string()))
        };
        let _ = pending.reply.send(result);
    }

    fn handle_crash(&self) {
        let ids: Vec<i64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.reply.send(Err(CoreError::Dispatch(format!("{} crashed", self.name))));
            }
        }
        self.crash_tx.send_modify(|generation| *generation += 1);
    }

    /// Subscribes to crash generations; each increment is one crash
    /// event. A `watch` channel rather than a one-shot because a
    /// backend may crash more than once over its lifetime.
    pub fn crash_events(&self) -> watch::Receiver<u64> {
        self.crash_tx.subscribe()
    }

    /// Sends a request and suspends until the backend replies.
    pub async fn send(&self, method: &str, payload: Value) -> CoreResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, Pending { reply: reply_tx });
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": payload.to_wire_json(),
        }))
        .map_err(|err| CoreError::Internal(err.to_string()))?;
        {
            let mut stdin = self.stdin.lock().await;
            write_message(&mut *stdin, &body).await?;
        }
        reply_rx
            .await
            .map_err(|_| CoreError::Dispatch(format!("{} closed before replying", self.name)))?
    }

    pub async fn send_notification(&self, method: &str, payload: Value) -> CoreResult<()> {
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": payload.to_wire_json(),
        }))
        .map_err(|err| CoreError::Internal(err.to_string()))?;
        let mut stdin = self.stdin.lock().await;
        write_message(&mut *stdin, &body).await
    }

    /// Idempotent: cancelling an id with no pending record, or one that
    /// already replied, is a no-op (per §4.4).
    pub fn cancel(&self, request_id: i64) {
        if let Some((_, pending)) = self.pending.remove(&request_id) {
            let _ = pending.reply.send(Err(CoreError::Cancelled));
        }
    }

    pub fn intern(&self, keyword: &str) -> Ident {
        INTERN_TABLE.intern(keyword)
    }

    pub async fn shutdown(&self) {
        let _ = self.child.lock().await.start_kill();
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `cat` echoes whatever it reads on stdin back to stdout
    /// unmodified, so framing a request through it and reading the
    /// reply back exercises the full write→read round trip against a
    /// real child process without depending on a fake backend binary.
    #[tokio::test]
    async fn send_through_echoing_process_round_trips() {
        let channel = BackendChannel::spawn("echo-backend", PathBuf::from("cat"), vec![])
            .await
            .expect("cat must be on PATH");
        let result = channel.send("ping", Value::Null).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancel_of_unknown_id_is_a_no_op() {
        let channel = BackendChannel::spawn("echo-backend", PathBuf::from("cat"), vec![])
            .await
            .expect("cat must be on PATH");
        channel.cancel(999);
    }
}
