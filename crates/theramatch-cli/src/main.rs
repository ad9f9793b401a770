//! Theramatch — evidence summarization and patient-profile drug ranking.
//! Entry point for the command-line binary.

mod input;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use theramatch_common::{EngineConfig, Relation};
use theramatch_ranker::{
    comparison::{compare_adjacent, DrugComparison},
    pipeline::candidate_drugs,
    rank_drugs, summarize_positioned, PrevalenceFinding, ProfileAssociation, RankedDrug,
    RecordRejection,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "theramatch",
    version,
    about = "Rank candidate drugs against a patient's test profile"
)]
struct Cli {
    /// Config file (defaults to THERAMATCH_CONFIG or ./theramatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the conditions with a directional prevalent finding for the selected drugs
    Summarize(CommonArgs),
    /// Rank the selected drugs for a patient's test results
    Rank(RankArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// JSON array of evidence records
    #[arg(long)]
    evidence: PathBuf,

    /// Candidate drug; repeat for several (default: config, else all drugs)
    #[arg(long = "drug")]
    drugs: Vec<String>,

    #[arg(long)]
    relation: Option<Relation>,

    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Args)]
struct RankArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Comma-separated condition tokens, each ending in p (positive) or m (negative)
    #[arg(long)]
    results: String,

    /// Also compare each drug with the next one in the ranking
    #[arg(long)]
    compare: bool,
}

#[derive(Serialize)]
struct InformativeConditions {
    relation: Relation,
    threshold: f64,
    drugs: Vec<String>,
    conditions: Vec<String>,
    findings: Vec<PrevalenceFinding>,
    rejected: Vec<RejectedRecord>,
}

#[derive(Serialize)]
struct RejectedRecord {
    position: usize,
    reason: String,
}

impl From<&RecordRejection> for RejectedRecord {
    fn from(rejection: &RecordRejection) -> Self {
        Self {
            position: rejection.position,
            reason: rejection.error.to_string(),
        }
    }
}

#[derive(Serialize)]
struct RankingRow {
    #[serde(flatten)]
    drug: RankedDrug,
    association: ProfileAssociation,
}

#[derive(Serialize)]
struct RankingReport {
    relation: Relation,
    threshold: f64,
    ranking: Vec<RankingRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparisons: Option<Vec<DrugComparison>>,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            match path.rsplit('.').next() {
                Some("yaml") | Some("yml") => EngineConfig::from_yaml(&path)?,
                Some("json") => EngineConfig::from_json(&path)?,
                _ => EngineConfig::from_toml(&path)?,
            }
        }
        None => EngineConfig::load()?,
    };
    Ok(config)
}

/// Command-line flags override the config file.
fn apply_overrides(mut config: EngineConfig, args: &CommonArgs) -> anyhow::Result<EngineConfig> {
    if let Some(relation) = args.relation {
        config.relation = relation;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if !args.drugs.is_empty() {
        config.candidate_drugs = args.drugs.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("theramatch=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let base = load_config(&cli)?;

    let common = match &cli.command {
        Command::Summarize(args) => args,
        Command::Rank(args) => &args.common,
    };
    let config = apply_overrides(base, common)?;

    let evidence = input::read_evidence(&common.evidence)?;
    info!(
        "Loaded {} evidence records from {} ({} unreadable)",
        evidence.records.len(),
        common.evidence.display(),
        evidence.rejected.len()
    );

    let mut summary = summarize_positioned(&evidence.records, config.parallel_threshold);
    summary.rejected.extend(evidence.rejected);
    summary.rejected.sort_by_key(|r| r.position);
    for rejection in &summary.rejected {
        warn!("{}", rejection.error);
    }
    let drugs = candidate_drugs(&summary.hypotheses, &config);
    let (relation, threshold) = (config.relation, config.threshold);

    let output = match &cli.command {
        Command::Summarize(_) => serde_json::to_string_pretty(&InformativeConditions {
            relation,
            threshold,
            conditions: summary.hypotheses.informative_conditions(&drugs, relation, threshold),
            findings: summary.hypotheses.informative_findings(&drugs, relation, threshold),
            rejected: summary.rejected.iter().map(RejectedRecord::from).collect(),
            drugs,
        })?,
        Command::Rank(args) => {
            let ranked =
                rank_drugs(&summary.hypotheses, &args.results, &drugs, relation, threshold);
            let comparisons = args.compare.then(|| compare_adjacent(&ranked));
            let ranking = ranked
                .into_iter()
                .map(|drug| RankingRow {
                    association: drug.association(threshold),
                    drug,
                })
                .collect();
            serde_json::to_string_pretty(&RankingReport {
                relation,
                threshold,
                ranking,
                comparisons,
            })?
        }
    };

    println!("{}", output);
    Ok(())
}
