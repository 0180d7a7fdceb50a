use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use persona_panels::config::{validate_agent_count, SessionConfig};
use persona_panels::llm::OpenAiClient;
use persona_panels::session::Session;
use persona_panels::tui::TerminalSurface;

#[derive(Parser)]
#[command(name = "persona-panels", about = "Stream N persona takes on a topic, side by side.")]
struct Cli {
    /// Discussion topic
    #[arg(long)]
    topic: String,

    /// Number of personas (1-7)
    #[arg(long)]
    agents: usize,

    /// Model to query (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Render refresh rate in Hz (overrides config)
    #[arg(long)]
    refresh_hz: Option<u32>,

    /// Config file (defaults to .persona-panels/config.yaml if present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("persona_panels=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SessionConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(hz) = cli.refresh_hz {
        config.refresh_hz = hz;
    }

    let agents = match validate_agent_count(cli.agents) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(2));
        }
    };
    if let Err(e) = config.refresh_period() {
        eprintln!("{e}");
        return Ok(ExitCode::from(2));
    }

    let client = match OpenAiClient::from_config(&config) {
        Ok(client) => client,
        Err(_) => {
            eprintln!("Missing OPENAI_API_KEY.");
            return Ok(ExitCode::from(2));
        }
    };

    println!(
        "\nGenerating {agents} persona(s) to discuss {}...\n",
        cli.topic
    );
    info!(model = %config.model, agents, "starting");

    let session = Session::new(Arc::new(client), config);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    // The alternate screen is entered only once personas are ready
    let (report, surface) = session
        .run(&cli.topic, agents, TerminalSurface::stdout, shutdown)
        .await?;
    // Leave the alternate screen before printing the transcript
    drop(surface);

    for panel in &report.panels {
        println!("── {} ──", panel.label);
        println!("{}\n", panel.text.trim());
    }
    if report.cancelled {
        println!("Interrupted by user.");
    }
    Ok(ExitCode::SUCCESS)
}
