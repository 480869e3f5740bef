use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tokio::runtime::Handle;

use ptrack_sdk::{LocalCharacter, MembersSnapshot, Tracker, TrackerConfig};
use ptrack_social::list_name;
use ptrack_store::SocialListMemberRepo;
use ptrack_types::{SocialList, SocialListKey};
use ptrack_visibility::parse_lines;

use crate::cli::*;

/// Dispatch a parsed command line.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Replay(args) => cmd_replay(config, &args, &cli.format),
        Command::Visibility(args) => match args.action {
            VisibilityAction::Parse { path } => cmd_visibility_parse(&path, &cli.format),
        },
        Command::Config(args) => match args.action {
            ConfigAction::Show => cmd_config_show(&config, &cli.format),
        },
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(TrackerConfig::default()),
    }
}

// ---- replay ----

#[derive(Clone, Copy, Debug, Default)]
struct ReplayOptions {
    add_players: bool,
    sync_categories: bool,
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
    snapshots: usize,
    players: usize,
    lists: Vec<ListSummary>,
    categories: Vec<CategorySummary>,
}

#[derive(Debug, Serialize)]
struct ListSummary {
    name: String,
    key: String,
    members: usize,
    page_count: u16,
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct CategorySummary {
    name: String,
    rank: u32,
    dynamic: bool,
    players: usize,
}

fn cmd_replay(config: TrackerConfig, args: &ReplayArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let snapshots: Vec<MembersSnapshot> =
        serde_json::from_str(&text).context("snapshot file must hold a JSON array of snapshots")?;
    let options = ReplayOptions {
        add_players: args.add_players,
        sync_categories: args.sync_categories,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(replay(config, snapshots, options))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

async fn replay(
    config: TrackerConfig,
    snapshots: Vec<MembersSnapshot>,
    options: ReplayOptions,
) -> anyhow::Result<ReplaySummary> {
    let Some(owner) = config.identity.clone() else {
        bail!("replay needs an [identity] table in the config file");
    };
    let tracker = Tracker::in_memory(config, &Handle::current())?;
    if options.add_players || options.sync_categories {
        prepare_lists(&tracker, &owner, &snapshots, options)?;
    }

    let count = snapshots.len();
    // One at a time: later pages of a list must see the earlier ones.
    for snapshot in snapshots {
        tracker.handle_snapshot(snapshot)?;
        tracker.wait_idle().await;
    }
    summarize(&tracker, &owner, count)
}

/// Create every list the snapshots touch up front so the flags are in
/// place before the first reconciliation.
fn prepare_lists(
    tracker: &Tracker,
    owner: &LocalCharacter,
    snapshots: &[MembersSnapshot],
    options: ReplayOptions,
) -> anyhow::Result<()> {
    let keys: BTreeSet<SocialListKey> = snapshots
        .iter()
        .map(|s| {
            SocialListKey::new(
                owner.content_id,
                s.list_type,
                s.list_number,
                owner.data_center_id,
            )
        })
        .collect();
    for key in keys {
        let mut list = SocialList::new(key);
        list.add_players = options.add_players;
        list.sync_with_category = options.sync_categories;
        tracker.social().save_social_list(&list)?;
    }
    Ok(())
}

fn summarize(tracker: &Tracker, owner: &LocalCharacter, snapshots: usize) -> anyhow::Result<ReplaySummary> {
    let mut lists = Vec::new();
    for list in tracker.social().social_lists(owner.content_id)? {
        let members = tracker.store().list_members(list.id)?.len();
        lists.push(ListSummary {
            name: list_name(list.list_type, list.list_number),
            key: list.key().to_string(),
            members,
            page_count: list.page_count,
            category: tracker
                .categories()
                .synced_category(list.id)
                .map(|c| c.name),
        });
    }

    let categories = tracker
        .categories()
        .categories(true)
        .into_iter()
        .map(|c| CategorySummary {
            players: tracker.players().category_players(c.id).len(),
            dynamic: c.social_list_id.is_some(),
            name: c.name,
            rank: c.rank,
        })
        .collect();

    Ok(ReplaySummary {
        snapshots,
        players: tracker.players().len(),
        lists,
        categories,
    })
}

fn print_summary(summary: &ReplaySummary) {
    println!(
        "{} Replayed {} snapshots, {} players tracked",
        "✓".green().bold(),
        summary.snapshots,
        summary.players.to_string().bold()
    );
    println!("\n{}", "Social lists".bold());
    for list in &summary.lists {
        let category = list
            .category
            .as_deref()
            .map(|c| format!(" -> {}", c.cyan()))
            .unwrap_or_default();
        println!(
            "  {} {} members{}",
            list.name.yellow(),
            list.members,
            category
        );
        println!("    {}", list.key.dimmed());
    }
    if summary.categories.is_empty() {
        return;
    }
    println!("\n{}", "Categories".bold());
    for category in &summary.categories {
        let marker = if category.dynamic { " (synced)".dimmed().to_string() } else { String::new() };
        println!(
            "  #{} {}{}: {} players",
            category.rank, category.name, marker, category.players
        );
    }
}

// ---- visibility ----

#[derive(Debug, Serialize)]
struct RejectedLine {
    line: usize,
    error: String,
}

fn cmd_visibility_parse(path: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let parsed = parse_lines(text.lines());
    let rejected: Vec<RejectedLine> = parsed
        .rejected
        .iter()
        .map(|(index, e)| RejectedLine {
            line: index + 1,
            error: e.to_string(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "entries": parsed.entries,
                "rejected": rejected,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            for entry in &parsed.entries {
                println!(
                    "  {} {} {}",
                    entry.name.bold(),
                    entry.world_id,
                    entry.reason.dimmed()
                );
            }
            for r in &rejected {
                println!("  {} line {}: {}", "✗".red(), r.line, r.error);
            }
            println!(
                "{} {} entries, {} rejected",
                "✓".green().bold(),
                parsed.entries.len(),
                rejected.len()
            );
        }
    }
    Ok(())
}

// ---- config ----

fn cmd_config_show(config: &TrackerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
