//! The provider RPC bridge.
//!
//! A [`Server`] binds provider instances to names and answers requests for
//! them; a [`Client`] sends those requests over any byte stream and hands out
//! [`RemoteProvider`]s, which implement
//! [`ResourceProvider`](provisor_core::ResourceProvider) just like the
//! provider they stand in for.
//!
//! ```text
//!  caller ── RemoteProvider ── Client ═══ stream ═══ Server ── provider
//! ```
//!
//! The two sides speak JSON-RPC 2.0 (see [`rpc`]). Errors raised by the
//! provider come back as the same [`provisor_core::Error`] value; failures of
//! the stream itself are [`provisor_core::Error::Transport`].

pub mod client;
pub mod codec;
pub mod framework;
pub mod logging;
pub mod rpc;
pub mod server;

pub use client::{Client, RemoteProvider};
pub use server::Server;
