//! authz-check - evaluate authorization questions offline
//!
//! Builds the engine over an in-memory resource tree described in a YAML
//! scenario, then answers one question per invocation.
//!
//! # Configuration
//!
//! Engine settings come from `--config` (YAML) and `AUTHZ__*` environment
//! variables; see `AuthzEngineConfig`. Log verbosity follows `RUST_LOG`.
//!
//! # Exit status
//!
//! `check` exits with 0 when granted and 1 when denied.

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use authz_engine::{AuthzEngineConfig, AuthzEngineModule};
use authz_engine_sdk::{ActorContext, CredentialDefinition, Privilege, ResourceId};
use clap::{Args, Parser, Subcommand};
use static_evaluator_plugin::StaticEvaluatorPlugin;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::scenario::Scenario;

/// Evaluate authorization questions against a YAML resource tree.
#[derive(Parser, Debug)]
#[command(name = "authz-check")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scenario file describing resources and their policies
    #[arg(short, long, global = true, default_value = "scenario.yaml")]
    scenario: PathBuf,

    /// Engine configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether the actor holds one privilege on a resource
    Check {
        #[command(flatten)]
        actor: ActorArgs,

        /// Resource id from the scenario
        #[arg(short, long)]
        resource: ResourceId,

        /// Privilege to check, e.g. `read` or `update`
        #[arg(short, long)]
        privilege: Privilege,
    },
    /// List every privilege the actor holds on a resource
    Privileges {
        #[command(flatten)]
        actor: ActorArgs,

        #[arg(short, long)]
        resource: ResourceId,
    },
}

#[derive(Args, Debug)]
struct ActorArgs {
    /// Held credential as `type[:resource-id]`; repeatable
    #[arg(long = "credential", value_name = "CREDENTIAL")]
    credentials: Vec<CredentialDefinition>,

    /// Act as an unauthenticated caller
    #[arg(long, conflicts_with = "credentials")]
    anonymous: bool,
}

impl ActorArgs {
    fn actor(&self) -> ActorContext {
        if self.anonymous {
            return ActorContext::anonymous();
        }
        ActorContext::builder()
            .credentials(self.credentials.iter().cloned())
            .build()
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = AuthzEngineConfig::load(cli.config.as_deref())
        .context("failed to load engine configuration")?;
    let scenario = Scenario::load(&cli.scenario)?;

    let mut module = AuthzEngineModule::new(config).with_repository(scenario.store()?);
    if let Some(remote) = scenario.remote.clone() {
        module = module.with_remote_evaluator(StaticEvaluatorPlugin::init(remote));
    }
    let engine = module.build()?;
    info!(scenario = %cli.scenario.display(), "engine ready");

    match cli.command {
        Command::Check {
            actor,
            resource,
            privilege,
        } => {
            let resource = scenario.resource(resource)?;
            let decision = engine
                .evaluate(&actor.actor(), &resource, privilege)
                .await
                .with_context(|| format!("cannot decide '{privilege}' on {resource}"))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else if decision.granted {
                println!("granted: '{privilege}' on {resource}");
            } else {
                let reason = decision
                    .deny_reason
                    .as_ref()
                    .map_or_else(String::new, |r| format!(" ({r})"));
                println!("denied: '{privilege}' on {resource}{reason}");
            }
            Ok(if decision.granted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Privileges { actor, resource } => {
            let resource = scenario.resource(resource)?;
            let privileges = engine
                .granted_privileges(&actor.actor(), &resource)
                .await
                .with_context(|| format!("cannot list privileges on {resource}"))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&privileges)?);
            } else {
                for privilege in &privileges {
                    println!("{privilege}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
