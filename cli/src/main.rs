use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use plancanvas_core::agent::{
    AgentRegistry, DiscoverySources, Dispatcher, PlannerSource, SessionResult,
};
use plancanvas_core::{DispatchError, InputOutcome, config, providers};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
mod onboard;

#[derive(Parser)]
#[command(name = "plancanvas")]
#[command(about = "plancanvas - plan a design with a team of agents, then draw it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    /// Run a design session
    Design {
        #[arg(short, long)]
        prompt: Option<String>,
        /// Always hand the plan to the pipeline agent instead of following ASSIGNED_TO
        #[arg(long)]
        pipeline: bool,
        #[arg(long)]
        json: bool,
    },
    /// List registered agents
    Agents {
        #[arg(short, long)]
        task: Option<String>,
    },
    /// Run the pipeline agent's synchronous input path on a plan
    Sketch {
        #[arg(short, long)]
        plan: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PLANCANVAS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_registry(config: &config::Config) -> Result<Arc<AgentRegistry>> {
    let provider = providers::create_provider(config)?;
    let registry = Arc::new(AgentRegistry::new());
    let plugins_dir = config.plugins_dir();
    tracing::debug!(provider = provider.name(), plugins = %plugins_dir.display(), "Discovering agents");
    let sources = DiscoverySources::new(provider).with_plugins_dir(plugins_dir);
    let report = registry.discover(&sources);
    if report.skipped > 0 {
        eprintln!(
            "{} {} agent module(s) skipped; set PLANCANVAS_LOG=debug for details",
            style("!").yellow(),
            report.skipped
        );
    }
    Ok(registry)
}

fn build_dispatcher(
    config: &config::Config,
    registry: Arc<AgentRegistry>,
    pipeline: bool,
) -> Result<Dispatcher> {
    if pipeline {
        let planner = registry
            .lookup(&config.planner)
            .with_context(|| format!("Pipeline planner '{}' is unavailable", config.planner))?;
        let worker = registry.lookup(&config.pipeline_agent).with_context(|| {
            format!("Pipeline agent '{}' is unavailable", config.pipeline_agent)
        })?;
        Ok(Dispatcher::pipeline(registry, planner, worker))
    } else {
        Ok(Dispatcher::new(registry).with_planner(PlannerSource::Registered(config.planner.clone())))
    }
}

/// Routes Ctrl-C for the whole process: it cancels the running session if
/// there is one, otherwise it exits.
#[derive(Clone, Default)]
struct Interrupts {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    fn install() -> Self {
        let interrupts = Self::default();
        let watcher = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !watcher.cancel_active() {
                    println!("\n👋 Goodbye!");
                    std::process::exit(130);
                }
            }
        });
        interrupts
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn end(&self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns false when no session was running.
    fn cancel_active(&self) -> bool {
        match self.active.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

async fn run_session(
    dispatcher: &Dispatcher,
    interrupts: &Interrupts,
    prompt: &str,
) -> Result<SessionResult, DispatchError> {
    let token = interrupts.begin();
    let result = dispatcher.run_until_cancelled(prompt, &token).await;
    interrupts.end();
    result
}

fn print_session(result: &SessionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    for line in &result.log {
        if line.starts_with("Warning:") {
            println!("{}", style(line).yellow());
        } else {
            println!("{}", line);
        }
        println!();
    }

    println!("{}", style("Diagram").cyan().bold());
    println!("{}", serde_json::to_string_pretty(&result.diagram)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Design {
                prompt: None,
                pipeline: false,
                json: false,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Design {
            prompt,
            pipeline,
            json,
        } => {
            let config = config::load_config()?;
            let registry = build_registry(&config)?;
            let dispatcher = build_dispatcher(&config, registry, pipeline)?;
            let interrupts = Interrupts::install();

            if let Some(prompt) = prompt {
                match run_session(&dispatcher, &interrupts, &prompt).await {
                    Ok(result) => print_session(&result, json)?,
                    Err(e) => {
                        eprintln!("❌ Error: {}", e);
                        anyhow::bail!("Design session failed: {}", e);
                    }
                }
            } else {
                println!("🎨 PlanCanvas");
                println!("Describe what to design (Ctrl+D to exit; Ctrl+C cancels a running session or exits when idle):\n");
                use std::io::{self, BufRead};
                let stdin = io::stdin();

                loop {
                    print!("> ");
                    let _ = io::stdout().flush();

                    let mut input = String::new();
                    let read = stdin.lock().read_line(&mut input);
                    match read {
                        Ok(0) | Err(_) => {
                            println!("\n👋 Goodbye!");
                            break;
                        }
                        Ok(_) => {
                            let input = input.trim();
                            if input.is_empty() {
                                continue;
                            }

                            println!("\n🤔 Planning...\n");

                            match run_session(&dispatcher, &interrupts, input).await {
                                Ok(result) => print_session(&result, json)?,
                                Err(e) => eprintln!("❌ Error: {}", e),
                            }

                            println!();
                        }
                    }
                }
            }
        }
        Commands::Agents { task } => {
            let config = config::load_config()?;
            let registry = build_registry(&config)?;
            let capable = task.as_deref().map(|t| registry.capable_of(t));

            for agent in registry.list() {
                let marker = match &capable {
                    Some(names) if names.iter().any(|n| n == agent.name()) => {
                        style("✓").green().to_string()
                    }
                    Some(_) => style("·").dim().to_string(),
                    None => "-".to_string(),
                };
                println!(
                    "{} {}: {}",
                    marker,
                    style(agent.name()).bold(),
                    agent.description()
                );
            }
        }
        Commands::Sketch { plan } => {
            let config = config::load_config()?;
            let registry = build_registry(&config)?;
            let agent = registry.lookup(&config.pipeline_agent)?.build();

            match agent.handle_input(&plan) {
                InputOutcome::Handled { result, log } => {
                    println!("{}", style(log).dim());
                    println!("{}", result);
                }
                InputOutcome::Unsupported => {
                    anyhow::bail!("Agent '{}' has no synchronous input path", agent.name());
                }
            }
        }
    }

    Ok(())
}
