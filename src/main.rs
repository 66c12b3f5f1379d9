//! smartplay CLI: run the reasoner over a JSON snapshot bundle.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use smartplay_reasoner::config::EngineConfig;
use smartplay_reasoner::engine::Engine;
use smartplay_reasoner::ingest::Snapshot;
use smartplay_reasoner::query::{Position, QueryOptions, QueryResponse};

#[derive(Parser)]
#[command(name = "smartplay", version, about = "SmartPlay fact graph reasoner")]
struct Cli {
    /// Engine configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot bundle (JSON with teams, players, fixtures, scores, injuries).
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine statistics.
    Info,

    /// Write a default configuration file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
    },

    /// Re-run inference and print per-rule counts.
    Infer,

    /// Execute a read-only SPARQL query.
    Query {
        /// Query text.
        sparql: String,

        /// Query the base graph only.
        #[arg(long)]
        base_only: bool,
    },

    /// Scored players, best first.
    Top {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Players in one position (GKP, DEF, MID, FWD).
    Position {
        position: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Players of one team by short name (e.g. ARS).
    Team {
        short_name: String,
        #[arg(long, default_value = "30")]
        limit: usize,
    },

    /// Low-ownership scored players.
    Differentials {
        /// Ownership ceiling in percent.
        #[arg(long, default_value = "10")]
        max_ownership: f64,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Inferred tags of one player.
    Tags { player_id: u32 },

    /// Entities typed with a class; without a class, per-tag counts.
    Class { name: Option<String> },

    /// Validate the graph against the constraint table.
    Validate,

    /// Validate a squad (comma-separated player ids).
    Squad {
        #[arg(value_delimiter = ',')]
        ids: Vec<u32>,
    },

    /// Export the graph.
    Export {
        /// Output file (stdout if omitted).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Label-resolved JSON instead of N-Triples.
        #[arg(long)]
        json: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_response(response: &QueryResponse) -> Result<()> {
    if let Some(error) = &response.outcome.error {
        eprintln!("query failed: {error}");
    }
    print_json(response.outcome.as_ref())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        EngineConfig::default().save(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config)?;

    if let Some(path) = &cli.snapshot {
        let json = std::fs::read_to_string(path).into_diagnostic()?;
        let snapshot = Snapshot::from_json_str(&json)?;
        let report = engine.rebuild(&snapshot)?;
        for skipped in &report.ingest.skipped {
            eprintln!("skipped {} {:?}: {}", skipped.kind, skipped.id, skipped.reason);
        }
    }

    match cli.command {
        Commands::InitConfig { .. } => {}

        Commands::Info => print!("{}", engine.stats()?),

        Commands::Infer => print_json(&engine.run_inference()?)?,

        Commands::Query { sparql, base_only } => {
            let mut options = QueryOptions::default().uncached();
            if base_only {
                options = options.base_only();
            }
            print_response(&engine.query(&sparql, &options))?;
        }

        Commands::Top { limit } => print_response(&engine.top_by_score(limit)?)?,

        Commands::Position { position, limit } => {
            let position: Position = position.parse()?;
            print_response(&engine.players_by_position(position, limit)?)?;
        }

        Commands::Team { short_name, limit } => {
            print_response(&engine.players_by_team(&short_name, limit)?)?;
        }

        Commands::Differentials {
            max_ownership,
            limit,
        } => print_response(&engine.differentials(max_ownership, limit)?)?,

        Commands::Tags { player_id } => print_json(&engine.tags_for_player(player_id)?)?,

        Commands::Class { name: Some(name) } => print_json(&engine.entities_of_class(&name)?)?,
        Commands::Class { name: None } => print_json(&engine.tag_summary()?)?,

        Commands::Validate => print_json(&engine.validate()?)?,

        Commands::Squad { ids } => print_json(&engine.validate_squad(&ids)?)?,

        Commands::Export { out, json } => {
            let text = if json {
                serde_json::to_string_pretty(&engine.export_triples()?).into_diagnostic()?
            } else {
                engine.export_ntriples()?
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, text).into_diagnostic()?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{text}"),
            }
        }
    }

    Ok(())
}
