use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

use codecrew_core::config::CrewConfig;
use codecrew_core::types::WorkflowStatus;
use codecrew_team::{run_workflow, run_workflow_stream, WorkflowRequest};

#[derive(Parser)]
#[command(name = "codecrew", version, about = "Multi-agent dev team orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "codecrew.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a development request through the team
    Run {
        /// The request to hand to the team
        #[arg(trailing_var_arg = true, required = true)]
        request: Vec<String>,

        /// Project id; scopes generated files under the workspace root
        #[arg(long)]
        project: Option<String>,

        /// Override the configured supervisor-turn budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Emit the run as JSON events, one per line
        #[arg(long)]
        stream: bool,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codecrew=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = CrewConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            request,
            project,
            max_iterations,
            stream,
        } => {
            let mut workflow = WorkflowRequest::new(request.join(" "));
            if let Some(project) = project {
                workflow = workflow.with_project(project);
            }
            if let Some(max) = max_iterations {
                workflow = workflow.with_max_iterations(max);
            }

            if stream {
                let mut events = run_workflow_stream(&config, workflow)?;
                let mut failed = false;
                while let Some(event) = events.next().await {
                    println!("{}", serde_json::to_string(&event)?);
                    if matches!(event, codecrew_core::event::WorkflowEvent::Error { .. }) {
                        failed = true;
                    }
                }
                if failed {
                    std::process::exit(1);
                }
            } else {
                let final_state = run_workflow(&config, workflow).await?;
                if let Some(response) = &final_state.final_response {
                    println!("{}", response);
                }
                if !final_state.artifacts.is_empty() {
                    println!("\nArtifacts:");
                    for artifact in &final_state.artifacts {
                        println!("  {}", artifact);
                    }
                }
                if final_state.status == WorkflowStatus::Failed {
                    error!("Workflow failed");
                    std::process::exit(1);
                }
            }
        }
        Commands::Config => {
            println!("config file : {}", cli.config.display());
            println!("model       : {}", config.model.model_id);
            println!(
                "endpoint    : {}",
                config.model.base_url.as_deref().unwrap_or("(OpenAI default)")
            );
            println!("api key     : {}", if config.model.api_key.is_some() { "set" } else { "not set" });
            println!("workspace   : {}", config.workspace_dir().display());
            println!("iterations  : {}", config.team.max_iterations);
        }
    }

    Ok(())
}
