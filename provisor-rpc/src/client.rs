//! The calling side of the bridge.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::async_client::{self, ClientBuilder};
use provisor_core::{
    Config, Error, ResourceDiff, ResourceProvider, ResourceState, ResourceType, Warnings,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug_span, Instrument as _, Span};

use crate::rpc::{
    from_client_error, ContentLengthReceiver, ContentLengthSender, ProviderRpcClient,
};

/// Provider operations may legitimately take a long time.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A handle to one connection with a [`Server`](crate::server::Server).
///
/// Cheap to clone. Calls from any number of tasks may be in flight at once;
/// each waits only for its own response.
#[derive(Clone)]
pub struct Client {
    connection: Arc<Mutex<Option<Arc<async_client::Client>>>>,
}

impl Client {
    /// Start talking JSON-RPC over `reader` and `writer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Client
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let rpc = ClientBuilder::new()
            .request_timeout(REQUEST_TIMEOUT)
            .build_with_tokio(
                ContentLengthSender::new(writer),
                ContentLengthReceiver::new(reader),
            );
        Client {
            connection: Arc::new(Mutex::new(Some(Arc::new(rpc)))),
        }
    }

    /// A [`ResourceProvider`] for the provider registered as `name` on the
    /// other side.
    pub fn provider(&self, name: impl Into<String>) -> RemoteProvider {
        RemoteProvider {
            client: self.clone(),
            name: name.into(),
        }
    }

    /// Stop making calls. The other side sees the end of the stream once the
    /// calls still in flight have been answered.
    pub fn close(&self) {
        self.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        match &*self.lock() {
            Some(rpc) => !rpc.is_connected(),
            None => true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<async_client::Client>>> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn connection(&self) -> Result<Arc<async_client::Client>, Error> {
        self.lock()
            .clone()
            .ok_or_else(|| Error::transport("connection closed"))
    }
}

/// A provider living on the other side of a [`Client`] connection.
#[derive(Clone)]
pub struct RemoteProvider {
    client: Client,
    name: String,
}

impl RemoteProvider {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        client.provider(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn span(&self, method: &'static str) -> Span {
        debug_span!("rpc call", provider = self.name.as_str(), method)
    }
}

#[async_trait]
impl ResourceProvider for RemoteProvider {
    async fn configure(&self, config: &Config) -> Result<Warnings, Error> {
        let rpc = self.client.connection()?;
        ProviderRpcClient::configure(&*rpc, self.name.clone(), config.clone())
            .instrument(self.span("configure"))
            .await
            .map_err(|e| from_client_error("configure", e))
    }

    async fn validate(&self, type_: &str, config: &Config) -> Result<Warnings, Error> {
        let rpc = self.client.connection()?;
        ProviderRpcClient::validate(&*rpc, self.name.clone(), type_.to_string(), config.clone())
            .instrument(self.span("validate"))
            .await
            .map_err(|e| from_client_error("validate", e))
    }

    async fn diff(&self, state: &ResourceState, config: &Config) -> Result<ResourceDiff, Error> {
        let rpc = self.client.connection()?;
        ProviderRpcClient::diff(&*rpc, self.name.clone(), state.clone(), config.clone())
            .instrument(self.span("diff"))
            .await
            .map_err(|e| from_client_error("diff", e))
    }

    async fn apply(
        &self,
        state: &ResourceState,
        diff: &ResourceDiff,
    ) -> Result<ResourceState, Error> {
        let rpc = self.client.connection()?;
        ProviderRpcClient::apply(&*rpc, self.name.clone(), state.clone(), diff.clone())
            .instrument(self.span("apply"))
            .await
            .map_err(|e| from_client_error("apply", e))
    }

    async fn resources(&self) -> Result<Vec<ResourceType>, Error> {
        let rpc = self.client.connection()?;
        ProviderRpcClient::resources(&*rpc, self.name.clone())
            .instrument(self.span("resources"))
            .await
            .map_err(|e| from_client_error("resources", e))
    }

    /// The server decides how calls are serialized; the client never blocks
    /// one call on another.
    fn reentrant(&self) -> bool {
        true
    }
}
