//! The provisor-runner executable
//!
//! Talks to a single provider executable over the bridge protocol, so that a
//! provider can be exercised by hand, without writing an acceptance test.

use std::future::Future;
use std::io::IsTerminal as _;
use std::process::exit;

use anyhow::{bail, Context, Result};
use clap::{ColorChoice, CommandFactory as _, Parser, Subcommand};
use provisor_core::{Config, ResourceDiff, ResourceProvider, ResourceState};
use provisor_rpc::{logging, RemoteProvider};
use provisor_runner::{inputs, ProviderConfig, ProviderProcess};
use tracing::{info, warn};

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    match &args.command {
        Commands::Resources { provider } => with_provider(&args.options, provider, run_resources),
        Commands::Apply(apply) => {
            with_provider(&args.options, &apply.provider, |p| run_apply(p, apply))
        }
        Commands::Destroy { provider, state_json } => {
            let state: ResourceState =
                serde_json::from_str(state_json).with_context(|| "failed to parse --state-json")?;
            with_provider(&args.options, provider, |p| run_destroy(p, state))
        }
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "provisor-runner",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Start the provider process, configure it, run `f` and shut the process
/// down again.
fn with_provider<F, Fut>(options: &Options, args: &ProviderArgs, f: F) -> Result<()>
where
    F: FnOnce(RemoteProvider) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    logging::set_up(&logging::Options {
        verbose: options.verbose,
        color: use_color(options.color),
    })?;

    let provider_config = match &args.provider_config_json {
        Some(s) => Config::from_value(
            serde_json::from_str(s).with_context(|| "failed to parse --provider-config-json")?,
        )
        .ok_or_else(|| anyhow::anyhow!("--provider-config-json must be a JSON object"))?,
        None => Config::new(),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "could not start the async runtime")?;

    rt.block_on(run_with(options, args, provider_config, f))
}

async fn run_with<F, Fut>(
    options: &Options,
    args: &ProviderArgs,
    provider_config: Config,
    f: F,
) -> Result<()>
where
    F: FnOnce(RemoteProvider) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let process = ProviderProcess::spawn(
        &ProviderConfig {
            executable: args.provider_exe.clone(),
            args: args.provider_arg.clone(),
        },
        options.verbose,
    )?;
    let p = process.provider();
    let r = match p.configure(&provider_config).await {
        Ok(warnings) => {
            for w in warnings {
                warn!("configure: {}", w);
            }
            f(p).await
        }
        Err(e) => Err(e).with_context(|| "could not configure the provider"),
    };
    // Shut down even if the operation failed, but report the first error.
    let closed = process.close_wait().await;
    r.and(closed)
}

async fn run_resources(p: RemoteProvider) -> Result<()> {
    for t in p.resources().await? {
        println!("{}", t.name);
    }
    Ok(())
}

async fn run_apply(p: RemoteProvider, args: &ApplyArgs) -> Result<()> {
    let config = inputs::collect(
        args.input_properties_json.as_deref(),
        &args.input_property_json,
        &args.input_property_str,
    )?;
    let current = match &args.state_json {
        Some(s) => serde_json::from_str(s).with_context(|| "failed to parse --state-json")?,
        None => ResourceState::absent(args.resource_type.clone()),
    };
    if current.type_ != args.resource_type {
        bail!(
            "--state-json is of type {:?}, not {:?}",
            current.type_,
            args.resource_type
        );
    }

    for w in p.validate(&args.resource_type, &config).await? {
        warn!("validate: {}", w);
    }
    let diff = p.diff(&current, &config).await?;
    if diff.is_empty() {
        info!("no changes");
    }
    let new_state = p.apply(&current, &diff).await?;
    println!("{}", serde_json::to_string_pretty(&new_state)?);
    Ok(())
}

async fn run_destroy(p: RemoteProvider, current: ResourceState) -> Result<()> {
    if !current.is_present() {
        bail!("the resource in --state-json has no id; there is nothing to destroy");
    }
    let diff = p.diff(&current, &Config::new()).await?;
    let diff = ResourceDiff {
        destroy: true,
        ..diff
    };
    let new_state = p.apply(&current, &diff).await?;
    if new_state.is_present() {
        bail!("resource still exists with id {:?}", new_state.id);
    }
    info!("destroyed {}", current.id);
    Ok(())
}

fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stderr().is_terminal(),
    }
}

fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("provisor-runner error: {:#}", e);
            exit(1);
        }
    }
}

/// Run provisor resource providers by hand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Parser, Debug, Clone)]
struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(clap::Args, Debug)]
struct ProviderArgs {
    /// The executable that implements the provider
    #[arg(long)]
    provider_exe: String,

    /// An argument to pass to the provider executable; may be repeated
    #[arg(long, value_name = "ARG")]
    provider_arg: Vec<String>,

    /// The provider configuration, as a JSON object
    #[arg(long("provider-config-json"))]
    provider_config_json: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    provider: ProviderArgs,

    /// The type of resource to create or update: an identifier recognized by the provider
    #[arg(long("type"))]
    resource_type: String,

    /// The current state of the resource, as printed by a previous `apply`.
    /// Omit to create a new resource.
    #[arg(long("state-json"))]
    state_json: Option<String>,

    /// The (whole) JSON input properties for the resource
    ///
    /// This is a JSON object with the values needed to create the resource.
    /// The structure of this object is defined by the provider.
    #[arg(long("inputs-json"))]
    input_properties_json: Option<String>,

    /// An individual input property for the resource, in JSON format
    #[arg(long("input-json"), short('j'), number_of_values = 2, value_names = &["NAME", "JSON"])]
    input_property_json: Vec<String>,

    /// An individual input property for the resource, as a raw string.
    ///
    /// This is equivalent to `--input-json NAME JSON` if JSON is the JSON string formatting of STR.
    #[arg(long("input-str"), short('s'), number_of_values = 2, value_names = &["NAME", "STR"])]
    input_property_str: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the resource types the provider supports
    Resources {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Create or update a resource, and print its new state
    Apply(ApplyArgs),

    /// Destroy a resource
    Destroy {
        #[command(flatten)]
        provider: ProviderArgs,

        /// The state of the resource, as printed by `apply`
        #[arg(long("state-json"))]
        state_json: String,
    },

    /// Generate markdown documentation for provisor-runner
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for provisor-runner
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for provisor-runner
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
