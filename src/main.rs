use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use attendance_report::models::{AttendanceStatus, GroupType, TimeSlot, TopicSummary};
use attendance_report::registry::RowStatus;
use attendance_report::tree::ExpandOutcome;
use attendance_report::{
    dates, render, ClientConfig, FetchKind, HttpReportSource, QueryPatch, ReportSession,
    ReportSource,
};

#[derive(Parser)]
#[command(name = "attendance-report")]
#[command(about = "Hierarchical attendance reports over the attendance API", long_about = None)]
struct Cli {
    /// TOML file with base_url, token and timeout_secs
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an attendance grid for a root group
    Report {
        #[arg(long)]
        group: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Weekdays to keep, e.g. `mon,wed,fri` or `1,3,5`
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        #[arg(long = "time-slot")]
        time_slots: Vec<String>,
        #[arg(long = "topic")]
        topics: Vec<String>,
        #[arg(long = "status")]
        statuses: Vec<String>,
        /// Group ids to expand once visible, in order
        #[arg(long)]
        expand: Vec<String>,
        /// Expand every visible group down to this many levels
        #[arg(long, default_value_t = 0)]
        depth: usize,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show a group with its immediate subgroups or users
    Group { id: String },
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>, base_url: Option<String>) -> anyhow::Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ClientConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if base_url.is_some() {
        config.base_url = base_url;
    }
    Ok(config)
}

fn parse_days(values: &[String]) -> anyhow::Result<Option<Vec<u8>>> {
    if values.is_empty() {
        return Ok(None);
    }
    values
        .iter()
        .map(|value| {
            dates::parse_weekday(value).with_context(|| format!("unknown weekday '{}'", value))
        })
        .collect::<anyhow::Result<Vec<u8>>>()
        .map(Some)
}

/// The filter only travels as ids, so bare ids are enough here.
fn filter_patch(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: Option<Vec<u8>>,
    time_slots: Vec<String>,
    topics: Vec<String>,
    statuses: Vec<String>,
) -> QueryPatch {
    let non_empty = |ids: Vec<String>| (!ids.is_empty()).then_some(ids);

    QueryPatch::date_range(start, end)
        .days_of_week(days)
        .time_slots(non_empty(time_slots).map(|ids| {
            ids.into_iter()
                .map(|id| TimeSlot {
                    id,
                    start_time: String::new(),
                    end_time: String::new(),
                })
                .collect()
        }))
        .topics(non_empty(topics).map(|ids| {
            ids.into_iter()
                .map(|id| TopicSummary {
                    name: id.clone(),
                    id,
                    color: None,
                })
                .collect()
        }))
        .attendance_statuses(non_empty(statuses).map(|ids| {
            ids.into_iter()
                .map(|id| AttendanceStatus {
                    name: id.clone(),
                    short_name: id.clone(),
                    id,
                    color: None,
                    organization_id: None,
                })
                .collect()
        }))
}

async fn expand_tree(
    session: &mut ReportSession<HttpReportSource>,
    depth: usize,
    expand: &[String],
) {
    let Some(root) = session.tree().map(|tree| tree.root()) else {
        return;
    };

    let mut frontier = vec![root];
    for _ in 0..depth {
        let mut next = Vec::new();
        for node in frontier {
            match session.expand(node) {
                Ok(ExpandOutcome::Groups(children)) => next.extend(children),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping expansion"),
            }
        }
        session.settle().await;
        frontier = next;
    }

    for group_id in expand {
        let node = session.tree().and_then(|tree| tree.find_visible(group_id));
        match node {
            Some(node) => {
                if let Err(e) = session.expand(node) {
                    warn!(%group_id, error = %e, "could not expand group");
                }
                session.settle().await;
            }
            None => warn!(%group_id, "group is not visible; expand its parent first"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref(), cli.base_url)?;
    let source = Arc::new(HttpReportSource::new(&config).context("failed to build API client")?);

    match cli.command {
        Commands::Group { id } => {
            let group = source
                .group(&id)
                .await
                .with_context(|| format!("failed to look up group {}", id))?;
            println!("{} ({})", group.name, group.id);
            match group.group_type {
                GroupType::GroupsGroup => {
                    println!("Subgroups:");
                    for sub in &group.groups {
                        let disabled = if sub.disabled { " [disabled]" } else { "" };
                        println!("- {} ({}){}", sub.name, sub.id, disabled);
                    }
                }
                GroupType::UsersGroup => {
                    println!("Users:");
                    for user in &group.users {
                        println!("- {} ({})", user.display_name(), user.id);
                    }
                }
            }
        }
        Commands::Report {
            group,
            start,
            end,
            days,
            time_slots,
            topics,
            statuses,
            expand,
            depth,
            format,
            out,
        } => {
            let root = source
                .group(&group)
                .await
                .with_context(|| format!("failed to look up group {}", group))?;

            let mut session = ReportSession::new(Arc::clone(&source));
            session.update_query(filter_patch(
                start,
                end,
                parse_days(&days)?,
                time_slots,
                topics,
                statuses,
            ));
            session.set_root_group(root.summary());
            session.settle().await;

            if let RowStatus::Failed(message) = session.row_status(&root.id, FetchKind::Group) {
                warn!(group_id = %root.id, error = %message, "root report failed");
            }

            expand_tree(&mut session, depth, &expand).await;

            let grid = session.grid();
            info!(rows = grid.rows.len(), columns = grid.axes.column_count(), "report ready");

            let rendered = match format {
                Format::Markdown => render::build_markdown(&grid).into_bytes(),
                Format::Csv => {
                    let mut buffer = Vec::new();
                    render::write_csv(&grid, &mut buffer)?;
                    buffer
                }
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&rendered)?;
                }
            }
        }
    }

    Ok(())
}
