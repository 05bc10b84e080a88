//! Contest Judging System CLI
//!
//! The `judging` command drives the mirror by hand.
//!
//! ## Commands
//!
//! - `sync`: Reconcile the mirror against the upstream contest source
//! - `judge`: Record one judge's rubric scores for an entry
//! - `allow-judge` / `is-allowed`: Manage the judge allow-list
//! - `contest` / `entry` / `sample`: Inspect mirrored contests
//! - `rubrics`: Show the rubric bounds used to validate votes

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use judging_core::{
    get_rubrics, init_tracing, load_contest, load_entry, sample_entries_from_store, ContestId,
    EntryId, HttpContestSource, IncomingScores, JudgeAllowList, JudgeAuthorizer, JudgeId,
    JudgingConfig, MirrorStore, ScoreAggregator, SyncService,
};
use judging_state::SurrealMirrorStore;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "judging")]
#[command(author = "Contest Judging System Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contest judging mirror and score aggregation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Base URL of the upstream contest API
    #[arg(long, global = true, env = "JUDGING_SOURCE_URL")]
    source_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the mirror with the upstream contest list
    Sync {
        /// Print the plan without writing to the mirror
        #[arg(long)]
        dry_run: bool,
    },

    /// Record a judge's scores for one entry
    Judge {
        /// Contest ID
        contest: String,

        /// Entry ID
        entry: String,

        /// Judge uid
        #[arg(long)]
        judge: String,

        /// Scores as a JSON object (`{"Level":..,"Clean_Code":..,"Creativity":..,"Overall":..}`)
        #[arg(long, conflicts_with_all = ["level", "clean_code", "creativity", "overall"])]
        scores: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        level: Option<i64>,

        #[arg(long, allow_hyphen_values = true)]
        clean_code: Option<i64>,

        #[arg(long, allow_hyphen_values = true)]
        creativity: Option<i64>,

        #[arg(long, allow_hyphen_values = true)]
        overall: Option<i64>,
    },

    /// Add a judge to the allow-list
    AllowJudge {
        /// Judge uid
        judge: String,
    },

    /// Check whether a judge may vote
    IsAllowed {
        /// Judge uid
        judge: String,
    },

    /// Show a mirrored contest
    Contest {
        /// Contest ID
        id: String,
    },

    /// Show a mirrored entry and its rubric
    Entry {
        /// Contest ID
        contest: String,

        /// Entry ID
        entry: String,
    },

    /// Pick random entries of a contest for judging
    Sample {
        /// Contest ID
        contest: String,

        /// Number of entries to pick
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Show rubric bounds
    Rubrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let mut config = JudgingConfig::from_env().context("Invalid judging configuration")?;
    if let Some(url) = cli.source_url {
        config = config.with_source_url(url);
    }

    let store: Arc<dyn MirrorStore> = Arc::new(
        SurrealMirrorStore::setup_from_env()
            .await
            .context("Failed to connect to the mirror database")?,
    );

    match cli.command {
        Commands::Sync { dry_run } => cmd_sync(store, &config, dry_run).await,
        Commands::Judge {
            contest,
            entry,
            judge,
            scores,
            level,
            clean_code,
            creativity,
            overall,
        } => {
            let incoming = match scores {
                Some(raw) => parse_scores(&raw)?,
                None => IncomingScores {
                    level: required(level, "--level")?,
                    clean_code: required(clean_code, "--clean-code")?,
                    creativity: required(creativity, "--creativity")?,
                    overall: required(overall, "--overall")?,
                },
            };
            cmd_judge(store, &config, &contest, &entry, &judge, incoming).await
        }
        Commands::AllowJudge { judge } => cmd_allow_judge(store, &judge).await,
        Commands::IsAllowed { judge } => cmd_is_allowed(store, &judge).await,
        Commands::Contest { id } => cmd_contest(store.as_ref(), &id).await,
        Commands::Entry { contest, entry } => cmd_entry(store.as_ref(), &contest, &entry).await,
        Commands::Sample { contest, count } => cmd_sample(store.as_ref(), &contest, count).await,
        Commands::Rubrics => cmd_rubrics(store.as_ref()).await,
    }
}

fn required(value: Option<i64>, flag: &str) -> Result<i64> {
    value.with_context(|| format!("{flag} is required unless --scores is given"))
}

fn parse_scores(raw: &str) -> Result<IncomingScores> {
    serde_json::from_str(raw)
        .context("Scores must name exactly Level, Clean_Code, Creativity and Overall")
}

/// Run one reconciliation pass, or print its plan with `--dry-run`.
async fn cmd_sync(
    store: Arc<dyn MirrorStore>,
    config: &JudgingConfig,
    dry_run: bool,
) -> Result<()> {
    let source =
        HttpContestSource::from_config(config).context("Failed to build contest source client")?;
    let service = SyncService::new(Arc::new(source), store, config);

    if dry_run {
        let plan = service.plan().await.context("Failed to compute sync plan")?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let report = service.sync().await.context("Sync pass failed")?;
    println!("Sync pass {}", report.pass_id);
    println!("  Contests added:   {}", report.plan.contests_added);
    println!("  Contests removed: {}", report.plan.contests_removed);
    println!("  Entries added:    {}", report.plan.entries_added);
    println!("  Entries removed:  {}", report.plan.entries_removed);
    println!("  Writes applied:   {}", report.applied);

    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("  ✗ {}", failure);
        }
        bail!("{} mirror write(s) failed", report.failures.len());
    }
    Ok(())
}

async fn cmd_judge(
    store: Arc<dyn MirrorStore>,
    config: &JudgingConfig,
    contest: &str,
    entry: &str,
    judge: &str,
    incoming: IncomingScores,
) -> Result<()> {
    let authorizer = Arc::new(JudgeAllowList::new(Arc::clone(&store)));
    let aggregator = ScoreAggregator::new(store, authorizer, config);

    let rubric = aggregator
        .judge_entry(
            &ContestId::from(contest),
            &EntryId::from(entry),
            &JudgeId::from(judge),
            incoming,
        )
        .await
        .context(format!(
            "Vote by {} on {}/{} was not recorded",
            judge, contest, entry
        ))?;

    info!(judges = rubric.number_of_judges, "vote recorded");
    println!("{}", serde_json::to_string_pretty(&rubric)?);
    Ok(())
}

async fn cmd_allow_judge(store: Arc<dyn MirrorStore>, judge: &str) -> Result<()> {
    let key = JudgeAllowList::new(store)
        .add_allowed_judge(&JudgeId::from(judge))
        .await
        .context("Failed to update the allow-list")?;
    println!("Allowed {} (record {})", judge, key);
    Ok(())
}

async fn cmd_is_allowed(store: Arc<dyn MirrorStore>, judge: &str) -> Result<()> {
    let allowed = JudgeAllowList::new(store)
        .is_judge_allowed(&JudgeId::from(judge))
        .await
        .context("Failed to read the allow-list")?;
    println!("{}", if allowed { "allowed" } else { "not allowed" });
    Ok(())
}

async fn cmd_contest(store: &dyn MirrorStore, id: &str) -> Result<()> {
    let contest = load_contest(store, &ContestId::from(id))
        .await?
        .context(format!("Contest not found: {}", id))?;

    println!("contest {}", contest.id);
    println!("Name:    {}", contest.name);
    println!("Entries: {}", contest.entries.len());
    for (entry_id, entry) in &contest.entries {
        println!(
            "  {} ({} judge(s))",
            entry_id, entry.scores.rubric.number_of_judges
        );
    }
    Ok(())
}

async fn cmd_entry(store: &dyn MirrorStore, contest: &str, entry: &str) -> Result<()> {
    let loaded = load_entry(store, &ContestId::from(contest), &EntryId::from(entry))
        .await?
        .context(format!("Entry not found: {}/{}", contest, entry))?;
    println!("{}", serde_json::to_string_pretty(&loaded)?);
    Ok(())
}

async fn cmd_sample(store: &dyn MirrorStore, contest: &str, count: usize) -> Result<()> {
    let picked = sample_entries_from_store(store, &ContestId::from(contest), count).await?;
    if picked.is_empty() {
        println!("No entries in contest '{}'", contest);
        return Ok(());
    }
    for entry in picked {
        println!("{}", entry.id);
    }
    Ok(())
}

async fn cmd_rubrics(store: &dyn MirrorStore) -> Result<()> {
    let rubrics = get_rubrics(store).await?;
    if rubrics.is_empty() {
        println!("No rubric bounds defined");
        return Ok(());
    }
    for (criterion, def) in rubrics {
        let bound = |b: Option<i64>| b.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:<12} min {:>4}  max {:>4}",
            criterion.name(),
            bound(def.min),
            bound(def.max)
        );
    }
    Ok(())
}
