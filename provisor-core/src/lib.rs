//! The provider capability contract.
//!
//! A provider knows how to configure, diff and apply changes to one category
//! of managed resource. This crate holds the interface every provider
//! satisfies, whether it runs in-process or behind the RPC bridge in
//! `provisor-rpc`, together with the values that cross that interface.

pub mod error;
pub mod mock;
pub mod provider;
pub mod state;
pub mod types;

pub use error::{Error, ProviderError, TransportError, ValidationError};
pub use provider::{ResourceProvider, Warnings};
pub use state::{ResourceAddress, State};
pub use types::{Config, ResourceAttrDiff, ResourceDiff, ResourceState, ResourceType};
