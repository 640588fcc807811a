//! Generic request/response bridging between `lsp_types` request shapes
//! and a backend channel's payload wire format.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::BackendChannel;
use crate::error::{CoreError, CoreResult};
use crate::payload::Value;

/// Serializes `params` to JSON, round-trips it through the payload wire
/// encoding, sends it under `method`, and deserializes the reply as
/// `R`. Every adapter method that maps one-to-one onto an LSP request
/// shape goes through this helper rather than hand-rolling the
/// plumbing per method.
pub(crate) async fn send_lsp_request<P, R>(channel: &BackendChannel, method: &str, params: &P) -> CoreResult<R>
where
    P: Serialize + Sync,
    R: DeserializeOwned,
{
    let json = serde_json::to_value(params).map_err(|err| CoreError::Internal(err.to_string()))?;
    let payload = Value::from_wire_json(json).map_err(|err| CoreError::Internal(err.to_string()))?;
    let response = channel.send(method, payload).await?;
    let response_json = response.to_wire_json();
    serde_json::from_value(response_json).map_err(|err| CoreError::Internal(err.to_string()))
}
