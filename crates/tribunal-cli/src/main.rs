//! Tribunal command-line interface.
//!
//! Scores interview answers with an ensemble of oracle judgments, and
//! exposes the deterministic pieces (gate, aggregation) as offline
//! subcommands that never touch the network.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use tribunal_core::{
    Aggregator, Answer, FinalScore, GateDecision, Gatekeeper, RawScore, ScoreSet, ScoringProfile,
    SessionSummary,
};
use tribunal_runtime::{
    EnsembleEvaluator, EnsembleEvaluatorBuilder, Oracle, OracleRegistry, RuntimeConfig, TemplateId,
};

#[derive(Parser)]
#[command(
    name = "tribunal",
    version,
    about = "Ensemble scoring for interview answers"
)]
struct Cli {
    /// Scoring profile file (YAML or JSON); defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Runtime configuration file (YAML or JSON); defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one answer with a full ensemble round
    Score {
        /// Answer text; stdin is read when neither this nor --file is given
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the answer from a file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Domain the answer belongs to, e.g. "database"
        #[arg(long, default_value = "general")]
        domain: String,

        /// Rubric template: general, technical, or behavioral
        #[arg(long, default_value = "general")]
        template: TemplateId,

        /// Emit the full score as JSON instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Score a JSONL file of answers, one {"text", "domain"} object per line
    Batch {
        /// Input JSONL file
        input: PathBuf,

        /// Rubric template applied to every answer
        #[arg(long, default_value = "general")]
        template: TemplateId,

        /// Write score JSONL here instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Check an answer against the quality gate; no oracle calls
    Gate {
        /// Answer text; stdin is read when neither this nor --file is given
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the answer from a file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Domain the answer belongs to
        #[arg(long, default_value = "general")]
        domain: String,
    },

    /// Aggregate pre-collected score values; no oracle calls
    Aggregate {
        /// JSON file holding an array of score values, e.g. [72, 75, 78]
        input: PathBuf,

        /// Panel size the values came from; defaults to the array length
        #[arg(long)]
        attempted: Option<usize>,
    },

    /// List the available rubric templates
    Templates,

    /// Verify the oracle backend is reachable and credentialed
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Score {
            text,
            file,
            domain,
            template,
            json,
        } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let config = load_config(cli.config.as_deref())?;
            let answer = Answer::new(read_text(text, file)?, domain);

            let evaluator = build_evaluator(profile, config)?;
            let score = evaluator.score(&answer, template).await?;
            emit_score(&score, json)?;
        }

        Commands::Batch {
            input,
            template,
            output,
        } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let config = load_config(cli.config.as_deref())?;
            let answers = read_answers_jsonl(&input)?;
            tracing::info!(answers = answers.len(), %template, "Scoring batch");

            let evaluator = build_evaluator(profile, config)?;
            let scores = evaluator.score_batch(&answers, template).await?;

            write_scores_jsonl(&scores, output.as_deref())?;
            eprintln!("{}", SessionSummary::from_scores(&scores));
        }

        Commands::Gate { text, file, domain } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let gatekeeper = Gatekeeper::from_profile(&profile);
            let answer = Answer::new(read_text(text, file)?, domain);

            match gatekeeper.validate(&answer) {
                GateDecision::Accepted => println!("accepted"),
                GateDecision::Rejected { reason } => {
                    println!("rejected: {reason}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Aggregate { input, attempted } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("reading scores from {}", input.display()))?;
            let values: Vec<f64> = serde_json::from_str(&contents)
                .with_context(|| format!("{}: expected a JSON array of numbers", input.display()))?;

            let attempted = attempted.unwrap_or(values.len());
            let scores = values
                .iter()
                .enumerate()
                .map(|(i, v)| RawScore::new(*v, "", Duration::ZERO, i))
                .collect();

            let aggregator = Aggregator::from_profile(&profile);
            let score = aggregator.aggregate(ScoreSet::from_scores(scores), attempted)?;
            println!("{}", serde_json::to_string_pretty(&score)?);
        }

        Commands::Templates => {
            for id in TemplateId::ALL {
                println!("{id:<12} {}", describe(id));
            }
        }

        Commands::Health => {
            let config = load_config(cli.config.as_deref())?;
            let oracle = create_oracle(&config)?;

            if oracle.health_check().await {
                println!("ok: {}", oracle.name());
            } else {
                println!("unavailable: {}", oracle.name());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_profile(path: Option<&Path>) -> Result<ScoringProfile> {
    let Some(path) = path else {
        return Ok(ScoringProfile::default());
    };

    let profile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ScoringProfile::from_json_file(path),
        _ => ScoringProfile::from_yaml_file(path),
    };

    profile.with_context(|| format!("loading scoring profile from {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };

    RuntimeConfig::from_file(path)
        .with_context(|| format!("loading runtime configuration from {}", path.display()))
}

fn create_oracle(config: &RuntimeConfig) -> Result<Arc<dyn Oracle>> {
    let registry = OracleRegistry::with_defaults();
    let options = serde_json::json!({});

    let oracle = registry
        .create(&config.oracle, &options)
        .with_context(|| format!("creating oracle backend '{}'", config.oracle))?;

    tracing::debug!(backend = %config.oracle, model = %config.model, "Oracle backend ready");
    Ok(oracle)
}

fn build_evaluator(profile: ScoringProfile, config: RuntimeConfig) -> Result<EnsembleEvaluator> {
    let oracle = create_oracle(&config)?;

    EnsembleEvaluatorBuilder::new()
        .oracle(oracle)
        .profile(profile)
        .config(config)
        .build()
        .context("building the ensemble evaluator")
}

fn read_text(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }

    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("reading answer from {}", path.display()));
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("reading answer from stdin")?;
    Ok(buffer)
}

fn read_answers_jsonl(path: &Path) -> Result<Vec<Answer>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading answers from {}", path.display()))?;

    let mut answers = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let answer: Answer = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid answer object", path.display(), number + 1))?;
        answers.push(answer);
    }

    Ok(answers)
}

fn write_scores_jsonl(scores: &[FinalScore], output: Option<&Path>) -> Result<()> {
    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    for score in scores {
        serde_json::to_writer(&mut out, score)?;
        out.write_all(b"\n")?;
    }

    Ok(())
}

fn emit_score(score: &FinalScore, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(score)?);
        return Ok(());
    }

    if score.unevaluated {
        let reason = score.rejection_reason.as_deref().unwrap_or("not evaluated");
        println!("Rejected: {reason}");
        return Ok(());
    }

    let mut line = format!(
        "Score: {:.1}  Grade: {}  Consistency: {}  Samples: {}",
        score.value,
        score.grade(),
        score.consistency(),
        score.samples
    );
    if score.degraded {
        line.push_str("  [degraded]");
    }
    if score.floor_applied {
        line.push_str("  [floor applied]");
    }
    println!("{line}");

    Ok(())
}

fn describe(id: TemplateId) -> &'static str {
    match id {
        TemplateId::General => "Balanced rubric for answers without a fixed domain",
        TemplateId::Technical => "Correctness-first rubric with hard caps for wrong claims",
        TemplateId::Behavioral => "Rubric for experience questions grounded in concrete outcomes",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_score_args_parse() {
        let cli = Cli::try_parse_from([
            "tribunal",
            "score",
            "--text",
            "an answer",
            "--template",
            "technical",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Score { template, json, .. } => {
                assert_eq!(template, TemplateId::Technical);
                assert!(json);
            }
            _ => panic!("expected score subcommand"),
        }
    }

    #[test]
    fn test_unknown_template_rejected() {
        let result = Cli::try_parse_from(["tribunal", "score", "--template", "freeform"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "tribunal",
            "gate",
            "--text",
            "an answer",
            "--profile",
            "profiles/strict.yaml",
        ])
        .unwrap();

        assert_eq!(cli.profile, Some(PathBuf::from("profiles/strict.yaml")));
    }
}
