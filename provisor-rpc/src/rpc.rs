//! The wire protocol: JSON-RPC 2.0 over `Content-Length` framed streams.
//!
//! Each method names the registered provider it is addressed to. Errors
//! raised by a provider travel as the `data` of the JSON-RPC error object, so
//! that the caller gets back the same [`Error`] value.

use std::io;

use futures_util::{SinkExt as _, StreamExt as _};
use jsonrpsee::{
    core::{
        client::{ReceivedMessage, TransportReceiverT, TransportSenderT},
        RpcResult,
    },
    proc_macros::rpc,
    types::{ErrorCode, ErrorObject, ErrorObjectOwned},
};
use provisor_core::{Config, Error, ResourceDiff, ResourceState, ResourceType, Warnings};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::ContentLengthCodec;

#[rpc(client, server, namespace = "provider")]
pub trait ProviderRpc {
    #[method(name = "configure", param_kind = map)]
    async fn configure(&self, provider: String, config: Config) -> RpcResult<Warnings>;

    #[method(name = "validate", param_kind = map)]
    async fn validate(
        &self,
        provider: String,
        #[argument(rename = "type")] type_: String,
        config: Config,
    ) -> RpcResult<Warnings>;

    #[method(name = "diff", param_kind = map)]
    async fn diff(
        &self,
        provider: String,
        state: ResourceState,
        config: Config,
    ) -> RpcResult<ResourceDiff>;

    #[method(name = "apply", param_kind = map)]
    async fn apply(
        &self,
        provider: String,
        state: ResourceState,
        diff: ResourceDiff,
    ) -> RpcResult<ResourceState>;

    #[method(name = "resources", param_kind = map)]
    async fn resources(&self, provider: String) -> RpcResult<Vec<ResourceType>>;
}

/// Wrap `error` for the wire. The message is for generic JSON-RPC clients;
/// ours decode the `data`.
pub(crate) fn error_object(error: Error) -> ErrorObjectOwned {
    ErrorObject::owned(
        ErrorCode::InternalError.code(),
        error.to_string(),
        Some(error),
    )
}

/// Recover the [`Error`] from a failed call to `method`.
pub(crate) fn from_client_error(method: &str, error: jsonrpsee::core::client::Error) -> Error {
    use jsonrpsee::core::client::Error as ClientError;
    match error {
        ClientError::Call(object) => {
            match object.data().map(|data| serde_json::from_str::<Error>(data.get())) {
                Some(Ok(e)) => e,
                // Not one of ours; most likely a method or parameter mismatch.
                _ => Error::transport(format!(
                    "{} failed with code {}: {}",
                    method,
                    object.code(),
                    object.message()
                )),
            }
        }
        ClientError::Transport(e) => Error::transport(format!("connection failed: {}", e)),
        ClientError::RestartNeeded(e) => Error::transport(format!("connection closed: {}", e)),
        ClientError::ParseError(e) => {
            Error::transport(format!("decoding result of {}: {}", method, e))
        }
        e => Error::transport(format!("{}: {}", method, e)),
    }
}

/// Sends JSON-RPC messages as `Content-Length` frames.
pub struct ContentLengthSender<W> {
    frames: FramedWrite<W, ContentLengthCodec>,
}

impl<W: AsyncWrite> ContentLengthSender<W> {
    pub fn new(writer: W) -> Self {
        ContentLengthSender {
            frames: FramedWrite::new(writer, ContentLengthCodec::new()),
        }
    }
}

impl<W> TransportSenderT for ContentLengthSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Error = io::Error;

    async fn send(&mut self, msg: String) -> io::Result<()> {
        self.frames.send(msg).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.frames.close().await
    }
}

/// Receives JSON-RPC messages from `Content-Length` frames.
pub struct ContentLengthReceiver<R> {
    frames: FramedRead<R, ContentLengthCodec>,
}

impl<R: AsyncRead> ContentLengthReceiver<R> {
    pub fn new(reader: R) -> Self {
        ContentLengthReceiver {
            frames: FramedRead::new(reader, ContentLengthCodec::new()),
        }
    }
}

impl<R> TransportReceiverT for ContentLengthReceiver<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    type Error = io::Error;

    async fn receive(&mut self) -> io::Result<ReceivedMessage> {
        match self.frames.next().await {
            Some(frame) => frame.map(ReceivedMessage::Text),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "the other side closed the connection",
            )),
        }
    }
}
