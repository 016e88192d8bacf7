pub mod inputs;

use anyhow::{bail, Context, Result};
use provisor_rpc::{
    framework::{DEFAULT_PROVIDER_NAME, VERBOSE_ENV_VAR},
    Client, RemoteProvider,
};
use serde_json::Value;
use tokio::process::{Child, Command};
use tracing::debug;

/// How to start a provider executable that speaks the bridge protocol on its
/// stdin and stdout: `{"type": "stdio", "executable": ..., "args": [...]}`.
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
}

pub fn parse_provider(provider_value: &Value) -> Result<ProviderConfig> {
    let provider = provider_value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Provider must be an object"))?;
    let type_ = provider
        .get("type")
        .ok_or_else(|| anyhow::anyhow!("Provider must have a type"))?;
    let type_ = type_
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Provider type must be a string"))?;
    match type_ {
        "stdio" => serde_json::from_value(provider_value.clone()).map_err(|e| e.into()),
        _ => {
            bail!("Unknown provider type: {}", type_);
        }
    }
}

/// A running provider executable and the connection to it.
pub struct ProviderProcess {
    executable: String,
    child: Child,
    client: Client,
}

impl ProviderProcess {
    /// Start the provider. Its stderr is shared with ours, for logs.
    pub fn spawn(config: &ProviderConfig, verbose: bool) -> Result<Self> {
        let mut command = Command::new(&config.executable);
        command
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        if verbose {
            command.env(VERBOSE_ENV_VAR, "1");
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("Could not spawn provider process {}", config.executable))?;

        let stdin = child
            .stdin
            .take()
            .context("provider process has no stdin")?;
        let stdout = child
            .stdout
            .take()
            .context("provider process has no stdout")?;
        debug!(
            executable = config.executable.as_str(),
            pid = child.id(),
            "spawned provider"
        );

        Ok(ProviderProcess {
            executable: config.executable.clone(),
            child,
            client: Client::new(stdout, stdin),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The provider served by the process.
    pub fn provider(&self) -> RemoteProvider {
        self.client.provider(DEFAULT_PROVIDER_NAME)
    }

    /// Hang up and wait for the process to exit.
    pub async fn close_wait(mut self) -> Result<()> {
        self.client.close();
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("waiting for provider process {}", self.executable))?;
        if !status.success() {
            bail!("provider process {} failed: {}", self.executable, status);
        }
        Ok(())
    }
}
