use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use pkgresearch::{logging, EcosystemSelector, ResearchConfig, ResearchRecord, ResearchRequest, Researcher};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research one or more packages and print the records as JSON
    Research {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,

        /// Ecosystem: auto, node, python or ruby
        #[arg(short, long, default_value = "auto")]
        ecosystem: EcosystemSelector,

        /// Ignore cached records
        #[arg(short, long)]
        refresh: bool,

        /// Print the consumer-facing context document instead of the raw record
        #[arg(short, long)]
        context: bool,
    },
    /// Detect which ecosystem publishes a package
    Probe {
        /// Package name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let config = ResearchConfig::load().context("loading configuration")?;
    let researcher = Researcher::new(&config).context("building research pipeline")?;

    match cli.command {
        Command::Research { names, ecosystem, refresh, context } => {
            let requests = names
                .iter()
                .map(|name| ResearchRequest::new(name.as_str()).ecosystem(ecosystem).refresh(refresh))
                .collect();

            let pb = create_spinner(format!("Researching {}", names.join(", ")));
            let results = researcher.research_many(requests).await;
            pb.finish_and_clear();

            let mut failed = 0;
            for (name, result) in names.iter().zip(results) {
                match result {
                    Ok(record) => print_record(&record, context)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("{} {}: {}", "[ERROR]".bright_red(), name, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} requests failed", names.len());
            }
        }
        Command::Probe { name } => {
            let pb = create_spinner(format!("Probing {name}"));
            let ecosystem = researcher.probe(&name).await?;
            pb.finish_and_clear();
            println!("{} {}", name.bright_white().bold(), ecosystem.to_string().bright_cyan());
        }
    }

    Ok(())
}

fn print_record(record: &ResearchRecord, context: bool) -> Result<()> {
    let label = if record.is_degraded() {
        "no information found".bright_yellow()
    } else {
        format!("{} example(s) via {}", record.examples.len(), record.sources.join(", ")).bright_green()
    };
    eprintln!("{} {}", record.identity.to_string().bright_white().bold(), label);

    let json = if context {
        serde_json::to_string_pretty(&record.to_context())?
    } else {
        serde_json::to_string_pretty(record)?
    };
    println!("{json}");
    Ok(())
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style.tick_strings(&["-", "\\", "|", "/", "-", "\\", "|", "/"]));
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
