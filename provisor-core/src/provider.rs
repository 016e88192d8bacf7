use async_trait::async_trait;

use crate::{Config, Error, ResourceDiff, ResourceState, ResourceType};

/// Non-blocking remarks about a configuration.
pub type Warnings = Vec<String>;

/// The capabilities every provider offers, local or remote.
///
/// Errors are returned as [`Error`] values so that they can be carried across
/// a process boundary and compared on the other side.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Adopt the provider configuration for subsequent calls. A later call
    /// supersedes an earlier one.
    ///
    /// A configuration that can't be used is reported as
    /// [`Error::Validation`].
    async fn configure(&self, config: &Config) -> Result<Warnings, Error>;

    /// Check a resource configuration without touching the backing system.
    async fn validate(&self, type_: &str, config: &Config) -> Result<Warnings, Error>;

    /// Compute the changes that converge `state` towards `config`.
    ///
    /// Must not create or mutate anything. An empty `config` for a present
    /// resource asks for its removal.
    async fn diff(&self, state: &ResourceState, config: &Config) -> Result<ResourceDiff, Error>;

    /// Execute `diff` against the backing system and return the new state.
    ///
    /// The returned state has a non-empty id, unless the diff destroyed the
    /// resource.
    async fn apply(&self, state: &ResourceState, diff: &ResourceDiff)
        -> Result<ResourceState, Error>;

    /// The resource types this provider manages.
    ///
    /// A local provider never fails here. The `Result` exists for bridged
    /// providers, whose connection may be gone.
    async fn resources(&self) -> Result<Vec<ResourceType>, Error>;

    /// Whether calls on this instance may run concurrently.
    fn reentrant(&self) -> bool {
        false
    }
}
