//! Sentinel CLI: terminal investigation console
//!
//! Drives an `InvestigationSession` against a running Sentinel backend.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use sentinel_console::attack_path::DEFAULT_HINT;
use sentinel_console::{
    AttackPathQuery, ClientConfig, FileReportSink, GraphOutcome, Incident, IncidentId,
    InvestigationSession, SimulationOutcome, StoryboardGraph, Tier3Outcome,
};
use tracing::warn;

#[derive(Parser)]
#[command(name = "sentinel", version, about = "Silent Sentinel investigation console")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "SENTINEL_URL")]
    url: Option<String>,

    /// YAML client configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List incidents, newest first
    Incidents,
    /// Trigger a hunt and refresh the list once it has settled
    Hunt,
    /// Show the storyboard graph of an incident
    Graph { incident: String },
    /// Run tier-3 analysis for an incident
    Tier3 { incident: String },
    /// Simulate attack paths between nodes
    Simulate {
        /// Entry node (repeatable)
        #[arg(long = "entry", default_values_t = [String::from("endpoint-1")])]
        entry: Vec<String>,
        /// Target node (repeatable)
        #[arg(long = "target", default_values_t = [String::from("db-2")])]
        target: Vec<String>,
        /// Vector search hint
        #[arg(long, default_value = "data exfil")]
        query: String,
    },
    /// Download an incident's PDF report
    Report {
        incident: String,
        /// Directory to save into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Show the related-event timeline of an incident
    Storyboard { incident: String },
    /// Check backend health
    Health,
    /// Run an immediate zero-day scan
    ZeroDay,
    /// Start an interactive investigation shell
    Shell,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> CliResult {
    let config = load_config(&cli)?;
    let session = InvestigationSession::connect(config)?;
    let format = &cli.format;

    match cli.command {
        Commands::Incidents => run_incidents(&session, format).await,
        Commands::Hunt => run_hunt(&session, format).await,
        Commands::Graph { incident } => run_graph(&session, IncidentId::new(incident), format).await,
        Commands::Tier3 { incident } => {
            select(&session, IncidentId::new(incident)).await;
            run_tier3(&session).await
        }
        Commands::Simulate { entry, target, query } => {
            run_simulate(&session, AttackPathQuery::new(entry, target, &query)).await
        }
        Commands::Report { incident, out } => {
            let session = session.with_report_sink(Arc::new(FileReportSink::new(out)));
            select(&session, IncidentId::new(incident)).await;
            run_report(&session).await
        }
        Commands::Storyboard { incident } => {
            select(&session, IncidentId::new(incident)).await;
            run_storyboard(&session, format).await
        }
        Commands::Health => run_health(&session).await,
        Commands::ZeroDay => run_zero_day(&session).await,
        Commands::Shell => run_shell(&session, format).await,
    }
}

/// Select an incident; a missing graph is reported but not fatal
async fn select(session: &InvestigationSession, incident: IncidentId) {
    if let Err(e) = session.select_incident(incident.clone()).await {
        warn!("Storyboard graph for {} unavailable: {}", incident, e);
    }
}

async fn run_incidents(session: &InvestigationSession, format: &OutputFormat) -> CliResult {
    session.refresh_incidents().await?;
    print_incidents(&session.incidents().state().incidents, format)
}

fn print_incidents(incidents: &[Incident], format: &OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(incidents)?);
        }
        OutputFormat::Table => {
            if incidents.is_empty() {
                println!("No incidents yet, run `sentinel hunt`");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["ID", "Detected", "Source", "Severity", "Description"]);

            for incident in incidents {
                table.add_row(vec![
                    incident.id.to_string(),
                    format_timestamp(incident),
                    incident.source.clone().unwrap_or_default(),
                    incident.severity.map(|s| format!("{:.3}", s)).unwrap_or_default(),
                    incident.description.clone(),
                ]);
            }

            println!("{}", table);
            println!("{} incident(s)", incidents.len());
        }
    }
    Ok(())
}

fn format_timestamp(incident: &Incident) -> String {
    incident
        .occurred_at()
        .map(|at| at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| incident.timestamp.to_string())
}

async fn run_hunt(session: &InvestigationSession, format: &OutputFormat) -> CliResult {
    session.refresh_incidents().await?;
    let before = session.incidents().state().len();

    let hunt = session.run_hunt().await;
    match &hunt.trigger {
        Ok(()) => println!("Hunt started; refreshing ({})", session.settle_policy().name()),
        Err(e) => warn!("Hunt trigger failed, refreshing anyway: {}", e),
    }
    let after = hunt.refresh.await??;
    println!("{} new incident(s)", after.saturating_sub(before));

    print_incidents(&session.incidents().state().incidents, format)
}

async fn run_graph(session: &InvestigationSession, incident: IncidentId, format: &OutputFormat) -> CliResult {
    match session.select_incident(incident).await? {
        GraphOutcome::Loaded(graph) => print_graph(&graph, format),
        GraphOutcome::Cleared | GraphOutcome::Discarded => Ok(()),
    }
}

fn print_graph(graph: &StoryboardGraph, format: &OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(graph)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["From", "To"]);
            for edge in &graph.edges {
                table.add_row(vec![edge.from.to_string(), edge.to.to_string()]);
            }

            let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
            println!("Storyboard for {}", graph.incident);
            println!("Nodes: {}", labels.join(", "));
            println!("{}", table);
            for warning in &graph.diagnostics.warnings {
                println!("warning: {}", warning);
            }
        }
    }
    Ok(())
}

async fn run_tier3(session: &InvestigationSession) -> CliResult {
    match session.run_tier3().await? {
        Tier3Outcome::Completed(analysis) => println!("{}", serde_json::to_string_pretty(&*analysis)?),
        Tier3Outcome::Discarded => println!("(selection changed; result discarded)"),
    }
    Ok(())
}

async fn run_simulate(session: &InvestigationSession, query: AttackPathQuery) -> CliResult {
    match session.simulate_path(query).await? {
        SimulationOutcome::Completed(result) => println!("{}", serde_json::to_string_pretty(&*result)?),
        SimulationOutcome::Superseded => println!("(superseded by a newer simulation)"),
    }
    Ok(())
}

async fn run_report(session: &InvestigationSession) -> CliResult {
    let location = session.download_report().await?;
    println!("Saved {}", location.display());
    Ok(())
}

async fn run_storyboard(session: &InvestigationSession, format: &OutputFormat) -> CliResult {
    let storyboard = session.storyboard_timeline().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&storyboard)?),
        OutputFormat::Table => println!("{}", storyboard.narrative),
    }
    Ok(())
}

async fn run_health(session: &InvestigationSession) -> CliResult {
    let health = session.health().await?;
    if health.is_ok() {
        println!("OK ({})", session.config().endpoint());
        Ok(())
    } else {
        Err(format!("backend unhealthy: {}", health.status).into())
    }
}

async fn run_zero_day(session: &InvestigationSession) -> CliResult {
    let scan = session.zero_day_scan().await?;
    println!("Status: {}", scan.status);
    println!("{}", serde_json::to_string_pretty(&scan.findings)?);
    Ok(())
}

async fn run_shell(session: &InvestigationSession, format: &OutputFormat) -> CliResult {
    println!("Sentinel Investigation Shell");
    println!("Type :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        let selection = session.selection();
        let prompt = match (selection.selected_incident_id, selection.modal_open) {
            (Some(id), true) => format!("sentinel[{}*]> ", id),
            (Some(id), false) => format!("sentinel[{}]> ", id),
            (None, _) => "sentinel> ".to_string(),
        };
        eprint!("{}", prompt);

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        let result = match command {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  list               - Refresh and list incidents");
                println!("  hunt               - Trigger a hunt");
                println!("  select <id>        - Select an incident and load its graph");
                println!("  close              - Close the incident modal");
                println!("  tier3              - Run tier-3 analysis on the selection");
                println!("  report             - Download the selection's PDF report");
                println!("  storyboard         - Show the selection's timeline");
                println!("  simulate <e> <t>   - Simulate attack paths from e to t");
                println!("  :quit              - Exit shell");
                Ok(())
            }
            "list" => run_incidents(session, format).await,
            "hunt" => run_hunt(session, format).await,
            "select" => match args.first() {
                Some(id) => run_graph(session, IncidentId::new(*id), format).await,
                None => Err("usage: select <id>".into()),
            },
            "close" => {
                session.close_modal();
                Ok(())
            }
            "tier3" => run_tier3(session).await,
            "report" => run_report(session).await,
            "storyboard" => run_storyboard(session, format).await,
            "simulate" => match args.as_slice() {
                [] => run_simulate(session, AttackPathQuery::default()).await,
                [entry, target, hint @ ..] => {
                    let hint = if hint.is_empty() { DEFAULT_HINT.to_string() } else { hint.join(" ") };
                    run_simulate(session, AttackPathQuery::new([*entry], [*target], &hint)).await
                }
                _ => Err("usage: simulate [<entry> <target> [hint...]]".into()),
            },
            other => Err(format!("unknown command '{}'", other).into()),
        };

        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }

    println!("Bye!");
    Ok(())
}
