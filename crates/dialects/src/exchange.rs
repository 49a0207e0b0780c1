//! The request/response cycle shared by every capability provider.

use protocol::sourceops::QueryEnvelope;
use protocol::{EndpointPath, HttpMethod, ResponseBody, SourceOpsError, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Posts `{"type": kind, "args": args}` to `path` and decodes the JSON reply.
pub(crate) async fn query<T, A, O>(
    transport: &T,
    path: &EndpointPath,
    kind: &str,
    args: A,
) -> Result<O, SourceOpsError>
where
    T: Transport,
    A: Serialize + Send,
    O: DeserializeOwned,
{
    let request = transport.new_request(HttpMethod::Post, path, &QueryEnvelope::new(kind, args))?;
    let mut body = ResponseBody::new();
    transport
        .execute(&CancellationToken::new(), request, &mut body)
        .await?;
    body.json()
        .map_err(|e| SourceOpsError::Decode(format!("{kind}: {e}")))
}
