//! Cap table CLI
//!
//! Inspects and mutates a client's cap table from a YAML fixture (companies
//! and persons) loaded into an in-memory store.
//!
//! # Usage
//!
//! ```bash
//! # Shareholders of a company, by name or id
//! cap_table_cli --fixture client.yaml --company "Acme Holdings" shareholders
//!
//! # Who can still be added as a representative, as JSON
//! cap_table_cli -f client.yaml -c co_0190... candidates --purpose representative -o json
//!
//! # Apply a command and write the result back
//! cap_table_cli -f client.yaml -c "Acme Holdings" apply --command grant.yaml --save
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use cap_table::persistence::PageRequest;
use cap_table::telemetry::{self, DEFAULT_FILTER};
use cap_table::types::{CompanyId, HolderRef};
use cap_table::{
    CandidatePurpose, CapTableService, Command, EngineConfig, EngineError, Fixture, MemoryStore,
    RequestScope, StaticSession,
};

#[derive(Parser)]
#[command(name = "cap_table_cli")]
#[command(version = "0.1.0")]
#[command(about = "Inspect and edit client cap tables from a YAML fixture")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fixture with the client's companies and persons
    #[arg(long, short, env = "CAP_TABLE_FIXTURE", global = true)]
    fixture: Option<PathBuf>,

    /// Target company, by id or exact name
    #[arg(long, short, global = true)]
    company: Option<String>,

    /// Engine config file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Purpose {
    Representative,
    Shareholder,
    Any,
}

impl From<Purpose> for CandidatePurpose {
    fn from(purpose: Purpose) -> Self {
        match purpose {
            Purpose::Representative => CandidatePurpose::Representative,
            Purpose::Shareholder => CandidatePurpose::Shareholder,
            Purpose::Any => CandidatePurpose::Any,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List shareholders with per-class shares and percentage
    Shareholders,

    /// List representatives with their governance roles
    Representatives,

    /// Show the ultimate beneficial owner
    Ubo,

    /// List candidates that can be added to the company
    Candidates {
        #[arg(long, value_enum, default_value = "representative")]
        purpose: Purpose,
    },

    /// Show where each candidate already has relationships
    Badges {
        #[arg(long, value_enum, default_value = "representative")]
        purpose: Purpose,
    },

    /// Search persons and companies by name
    Search {
        query: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Apply a command read from a YAML file
    Apply {
        /// YAML file holding one command
        #[arg(long)]
        command: PathBuf,

        /// Write the resulting store back to the fixture file
        #[arg(long)]
        save: bool,
    },
}

type Service = CapTableService<MemoryStore, StaticSession>;

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(&cli).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                let body = error_json(&e);
                println!("{body}");
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;
    telemetry::init_tracing(config.log_filter.as_deref().unwrap_or(DEFAULT_FILTER));

    let fixture_path = cli
        .fixture
        .as_deref()
        .ok_or_else(|| anyhow!("--fixture (or CAP_TABLE_FIXTURE) is required"))?;
    let fixture = Fixture::from_file(fixture_path)?;
    let company_id = resolve_company(&fixture, cli.company.as_deref())?;

    let service = Service::new(
        MemoryStore::from_fixture(fixture),
        StaticSession::new("local-fixture"),
    );
    service
        .load(company_id)
        .await
        .context("Failed to load company")?;

    match &cli.command {
        Commands::Shareholders => cmd_shareholders(&service, cli.format).await,
        Commands::Representatives => cmd_representatives(&service, cli.format).await,
        Commands::Ubo => cmd_ubo(&service, cli.format).await,
        Commands::Candidates { purpose } => {
            cmd_candidates(&service, (*purpose).into(), cli.format).await
        }
        Commands::Badges { purpose } => cmd_badges(&service, (*purpose).into(), cli.format).await,
        Commands::Search {
            query,
            page,
            page_size,
        } => cmd_search(&service, query, PageRequest::new(*page, *page_size), cli.format).await,
        Commands::Apply { command, save } => {
            cmd_apply(&service, command, save.then_some(fixture_path), cli.format).await
        }
    }
}

fn resolve_company(fixture: &Fixture, selector: Option<&str>) -> Result<CompanyId> {
    let Some(selector) = selector else {
        return match fixture.companies.as_slice() {
            [only] => Ok(only.id),
            _ => bail!("--company is required when the fixture holds several companies"),
        };
    };
    if let Ok(id) = selector.parse::<CompanyId>() {
        return Ok(id);
    }
    fixture
        .companies
        .iter()
        .find(|c| c.name == selector)
        .map(|c| c.id)
        .ok_or_else(|| anyhow!("No company named '{selector}' in fixture"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}

fn error_json(error: &anyhow::Error) -> serde_json::Value {
    let field_errors = error
        .downcast_ref::<EngineError>()
        .and_then(EngineError::validation_errors)
        .map(|errors| errors.to_field_errors());
    serde_json::json!({
        "error": format!("{error:#}"),
        "field_errors": field_errors,
    })
}

fn ubo_marker(is_ubo: bool) -> String {
    if is_ubo {
        format!(" {}", "[UBO]".yellow().bold())
    } else {
        String::new()
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_shareholders(service: &Service, format: OutputFormat) -> Result<()> {
    let rows = service.shareholder_view().await?;
    if format == OutputFormat::Json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No shareholders".dimmed());
    }
    for row in rows {
        let shares = match row.percentage_class {
            Some(class) => class.to_string(),
            None => row
                .classes
                .iter()
                .map(|c| format!("{}: {}", c.class, c.shares))
                .collect::<Vec<_>>()
                .join(", "),
        };
        println!(
            "{:<32} {:>8}%  {}{}",
            row.name.bold(),
            row.percentage,
            shares,
            ubo_marker(row.is_ubo)
        );
    }
    Ok(())
}

async fn cmd_representatives(service: &Service, format: OutputFormat) -> Result<()> {
    let rows = service.representative_view().await?;
    if format == OutputFormat::Json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No representatives".dimmed());
    }
    for row in rows {
        let origin = row
            .source_company_name
            .map(|name| format!(" (via {name})"))
            .unwrap_or_default();
        println!(
            "{:<32} {}{}{}",
            row.name.bold(),
            row.role_labels.join(", "),
            origin.dimmed(),
            ubo_marker(row.is_ubo)
        );
    }
    Ok(())
}

async fn cmd_ubo(service: &Service, format: OutputFormat) -> Result<()> {
    let ubo = service.ubo().await?;
    if format == OutputFormat::Json {
        return print_json(&ubo);
    }
    match ubo {
        Some(ubo) => println!(
            "{} {} ({}%, {})",
            "UBO:".green().bold(),
            ubo.name,
            ubo.percentage.round_dp(cap_table::views::PERCENT_DP),
            ubo.ranking_class
        ),
        None => println!("{}", "No beneficial owner (no holdings)".dimmed()),
    }
    Ok(())
}

async fn cmd_candidates(
    service: &Service,
    purpose: CandidatePurpose,
    format: OutputFormat,
) -> Result<()> {
    let candidates = service.candidates(purpose).await?;
    if format == OutputFormat::Json {
        return print_json(&candidates);
    }
    for candidate in candidates {
        let origin = candidate
            .source_company_name
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        println!(
            "{:<32} {:?}{}",
            candidate.name.bold(),
            candidate.source,
            origin.dimmed()
        );
    }
    Ok(())
}

async fn cmd_badges(
    service: &Service,
    purpose: CandidatePurpose,
    format: OutputFormat,
) -> Result<()> {
    let scope = RequestScope::new();
    let badges = service
        .relationship_badges(purpose, &scope)
        .await?
        .ok_or_else(|| anyhow!("Badge fetch was superseded"))?;
    let names: std::collections::HashMap<HolderRef, String> = service
        .candidates(purpose)
        .await?
        .into_iter()
        .map(|c| (c.holder, c.name))
        .collect();

    if format == OutputFormat::Json {
        let rows: Vec<_> = badges
            .iter()
            .map(|(holder, badges)| {
                serde_json::json!({
                    "holder": holder,
                    "name": names.get(holder),
                    "shareholder_in": badges.shareholder_in,
                    "representative_in": badges.representative_in,
                })
            })
            .collect();
        return print_json(&rows);
    }
    for (holder, badges) in badges.iter().filter(|(_, b)| !b.is_empty()) {
        let name = names.get(holder).cloned().unwrap_or_else(|| holder.to_string());
        println!("{}", name.bold());
        if !badges.shareholder_in.is_empty() {
            println!("  shareholder in:    {}", badges.shareholder_in.join(", "));
        }
        if !badges.representative_in.is_empty() {
            println!("  representative in: {}", badges.representative_in.join(", "));
        }
    }
    Ok(())
}

async fn cmd_search(
    service: &Service,
    query: &str,
    page: PageRequest,
    format: OutputFormat,
) -> Result<()> {
    let results = service.search(query, page).await?;
    if format == OutputFormat::Json {
        return print_json(&results);
    }
    for hit in &results.items {
        println!("{:<32} {}", hit.name.bold(), hit.holder.to_string().dimmed());
    }
    println!(
        "{}",
        format!(
            "page {} of {} ({} results)",
            results.page,
            results.total_pages(),
            results.total_items
        )
        .dimmed()
    );
    Ok(())
}

async fn cmd_apply(
    service: &Service,
    command_path: &Path,
    save_to: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(command_path)
        .with_context(|| format!("Failed to read {}", command_path.display()))?;
    let command: Command = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid command in {}", command_path.display()))?;

    let name = command.name();
    let graph = service.execute(command).await?;

    if let Some(path) = save_to {
        let fixture = service.store().snapshot().await;
        let yaml = serde_yaml::to_string(&fixture).context("Failed to encode fixture")?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if format == OutputFormat::Json {
        return print_json(graph.company());
    }
    println!(
        "{} {} applied to {} (version {})",
        "OK".green().bold(),
        name,
        graph.company().name,
        graph.company().version
    );
    cmd_shareholders(service, format).await
}
