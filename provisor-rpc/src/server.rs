//! The serving side of the bridge: a registry of named providers, and the
//! JSON-RPC methods that route calls to them.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures_util::{SinkExt as _, StreamExt as _};
use jsonrpsee::{
    core::RpcResult,
    types::{ErrorCode, ErrorObject, Id, InvalidRequest, Response, ResponsePayload},
    Methods,
};
use provisor_core::{
    Config, Error, ResourceDiff, ResourceProvider, ResourceState, ResourceType, Warnings,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, debug_span, warn, Instrument as _};

use crate::codec::ContentLengthCodec;
use crate::rpc::{error_object, ProviderRpcServer};

struct Entry {
    provider: Arc<dyn ResourceProvider>,
    /// Held for the duration of each call when the provider isn't reentrant.
    serial: Option<Mutex<()>>,
}

type Registry = BTreeMap<String, Arc<Entry>>;

/// Registrar and dispatcher for providers served over one or more
/// connections.
///
/// Registration is append-only: a name, once bound, keeps its provider for
/// the lifetime of the server.
#[derive(Clone, Default)]
pub struct Server {
    registry: Arc<RwLock<Registry>>,
    next_name: Arc<AtomicU64>,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under a generated name, which is returned.
    pub async fn register(&self, provider: Arc<dyn ResourceProvider>) -> Result<String, Error> {
        loop {
            let n = self.next_name.fetch_add(1, Ordering::Relaxed) + 1;
            let name = format!("ResourceProvider{}", n);
            match self.register_named(name.clone(), provider.clone()).await {
                Ok(()) => return Ok(name),
                // Taken by an explicit registration; try the next one.
                Err(Error::NameConflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Register `provider` under `name`.
    ///
    /// The provider is asked for its resource types first; a provider that
    /// can't answer is refused. Of two concurrent registrations of one name,
    /// exactly one wins.
    pub async fn register_named(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn ResourceProvider>,
    ) -> Result<(), Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidProvider {
                name,
                reason: "the name is empty".to_string(),
            });
        }
        if self.read().contains_key(&name) {
            return Err(Error::NameConflict { name });
        }

        let types = provider
            .resources()
            .await
            .map_err(|e| Error::InvalidProvider {
                name: name.clone(),
                reason: format!("listing resource types failed: {}", e),
            })?;

        let entry = Arc::new(Entry {
            serial: (!provider.reentrant()).then(|| Mutex::new(())),
            provider,
        });
        let mut registry = self.write();
        if registry.contains_key(&name) {
            return Err(Error::NameConflict { name });
        }
        debug!(
            name = name.as_str(),
            types = ?types.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "registered provider"
        );
        registry.insert(name, entry);
        Ok(())
    }

    /// Names of all registered providers.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    // A panic while holding the lock leaves the map intact, so poisoning is
    // ignored.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup(&self, name: &str) -> Result<Arc<Entry>, Error> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })
    }

    /// Run `call` against the provider registered as `name`, holding its
    /// lock if it isn't reentrant.
    async fn call<T, F, Fut>(&self, name: String, method: &'static str, call: F) -> RpcResult<T>
    where
        F: FnOnce(Arc<dyn ResourceProvider>) -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
        T: Send + 'static,
    {
        let span = debug_span!("dispatch", provider = name.as_str(), method);
        let result = async {
            let entry = self.lookup(&name)?;
            let _guard = match &entry.serial {
                Some(serial) => Some(serial.lock().await),
                None => None,
            };
            // A panicking provider must not take the connection down, nor
            // leave the caller waiting.
            match tokio::spawn(call(entry.provider.clone())).await {
                Ok(result) => result,
                Err(e) => Err(Error::provider(format!("provider task failed: {}", e))),
            }
        }
        .instrument(span)
        .await;
        result.map_err(|e| {
            debug!(provider = name.as_str(), method, "request failed: {}", e);
            error_object(e)
        })
    }

    /// Answer requests from `reader` on `writer` until the peer closes the
    /// stream.
    ///
    /// Requests are handled concurrently. A request that isn't valid JSON-RPC
    /// is answered with an "invalid request" error if its id can be
    /// recovered, and dropped otherwise; either way the loop keeps going.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let methods: Methods = self.clone().into_rpc().into();

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, ContentLengthCodec::new());
            while let Some(frame) = rx.recv().await {
                sink.send(frame).await?;
            }
            sink.close().await
        });

        let mut frames = FramedRead::new(reader, ContentLengthCodec::new());
        let mut tasks = JoinSet::new();
        let read_result = loop {
            let frame = match frames.next().await {
                None => break Ok(()),
                Some(Err(e)) => {
                    break Err(Error::transport(format!("reading requests: {}", e)));
                }
                Some(Ok(frame)) => frame,
            };
            let methods = methods.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let response = match methods.raw_json_request(&frame, 1).await {
                    Ok((response, _)) => response.get().to_string(),
                    Err(e) => match invalid_request_response(&frame) {
                        Some(response) => response,
                        None => {
                            warn!("dropping undecodable request: {}", e);
                            return;
                        }
                    },
                };
                if tx.send(response).is_err() {
                    warn!("connection gone, response dropped");
                }
            });
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    warn!("request task failed: {}", e);
                }
            }
        };

        // Answer what is in flight before hanging up.
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                warn!("request task failed: {}", e);
            }
        }
        drop(tx);
        let write_result = match writer_task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::transport(format!("writing responses: {}", e))),
            Err(e) => Err(Error::transport(format!("response writer failed: {}", e))),
        };
        read_result.and(write_result)
    }
}

fn invalid_request_response(frame: &str) -> Option<String> {
    let InvalidRequest { id } = serde_json::from_str(frame).ok()?;
    if matches!(id, Id::Null) {
        return None;
    }
    let payload: ResponsePayload<'_, ()> =
        ResponsePayload::error(ErrorObject::from(ErrorCode::InvalidRequest));
    serde_json::to_string(&Response::new(payload, id)).ok()
}

#[async_trait]
impl ProviderRpcServer for Server {
    async fn configure(&self, provider: String, config: Config) -> RpcResult<Warnings> {
        self.call(provider, "configure", |p| async move {
            p.configure(&config).await
        })
        .await
    }

    async fn validate(
        &self,
        provider: String,
        type_: String,
        config: Config,
    ) -> RpcResult<Warnings> {
        self.call(provider, "validate", |p| async move {
            p.validate(&type_, &config).await
        })
        .await
    }

    async fn diff(
        &self,
        provider: String,
        state: ResourceState,
        config: Config,
    ) -> RpcResult<ResourceDiff> {
        self.call(provider, "diff", |p| async move {
            p.diff(&state, &config).await
        })
        .await
    }

    async fn apply(
        &self,
        provider: String,
        state: ResourceState,
        diff: ResourceDiff,
    ) -> RpcResult<ResourceState> {
        self.call(provider, "apply", |p| async move {
            p.apply(&state, &diff).await
        })
        .await
    }

    async fn resources(&self, provider: String) -> RpcResult<Vec<ResourceType>> {
        self.call(provider, "resources", |p| async move { p.resources().await })
            .await
    }
}
