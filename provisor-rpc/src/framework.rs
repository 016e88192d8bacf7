//! Entry point for provider executables.

use std::fs::File;
use std::io;
use std::os::fd::{AsFd as _, AsRawFd as _};
use std::sync::Arc;

use anyhow::{Context, Result};
use nix::unistd::dup2;
use provisor_core::ResourceProvider;

use crate::{logging, server::Server};

/// Name under which [`run_main`] registers its provider.
pub const DEFAULT_PROVIDER_NAME: &str = "provider";

/// Setting this environment variable to a non-empty value turns on verbose
/// logging in the provider process.
pub const VERBOSE_ENV_VAR: &str = "PROVISOR_PROVIDER_VERBOSE";

/// Serve `provider` on the process' stdin and stdout until the caller hangs
/// up. Exits the process on failure.
pub async fn run_main(provider: impl ResourceProvider + 'static) {
    if let Err(e) = serve_stdio(Arc::new(provider)).await {
        eprintln!("provider error: {:#}", e);
        std::process::exit(1);
    }
}

async fn serve_stdio(provider: Arc<dyn ResourceProvider>) -> Result<()> {
    let channel =
        ProtocolChannel::claim_stdio().with_context(|| "Could not set up the protocol channels")?;

    let verbose = std::env::var(VERBOSE_ENV_VAR).is_ok_and(|v| !v.is_empty());
    logging::set_up(&logging::Options {
        verbose,
        color: false,
    })?;

    let server = Server::new();
    server
        .register_named(DEFAULT_PROVIDER_NAME, provider)
        .await
        .with_context(|| "Could not register the provider")?;

    server
        .serve(
            tokio::fs::File::from_std(channel.requests),
            tokio::fs::File::from_std(channel.responses),
        )
        .await
        .with_context(|| "Provider connection failed")
}

/// The caller's end of the conversation, taken over from stdio.
struct ProtocolChannel {
    requests: File,
    responses: File,
}

impl ProtocolChannel {
    /// Keep private copies of stdin and stdout for the protocol, then point
    /// fd 0 at `/dev/null` and fd 1 at stderr, so that nothing the provider
    /// prints can corrupt a message.
    fn claim_stdio() -> Result<Self> {
        let requests = File::from(
            io::stdin()
                .as_fd()
                .try_clone_to_owned()
                .with_context(|| "Could not duplicate stdin")?,
        );
        let responses = File::from(
            io::stdout()
                .as_fd()
                .try_clone_to_owned()
                .with_context(|| "Could not duplicate stdout")?,
        );

        let dev_null = File::open("/dev/null").with_context(|| "Could not open /dev/null")?;
        dup2(dev_null.as_raw_fd(), io::stdin().as_raw_fd())
            .with_context(|| "Could not redirect stdin to /dev/null")?;
        dup2(io::stderr().as_raw_fd(), io::stdout().as_raw_fd())
            .with_context(|| "Could not redirect stdout to stderr")?;

        Ok(ProtocolChannel {
            requests,
            responses,
        })
    }
}
