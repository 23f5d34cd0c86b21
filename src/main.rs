use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voyager_judge::config;
use voyager_judge::judge::{Judge, JudgeConfig, OpenAiJudge};
use voyager_judge::pipeline::BatchOrchestrator;
use voyager_judge::report::compute_accuracy;
use voyager_judge::tasks::load_tasks;

/// Voyager Judge - evaluate web-agent task attempts with a multimodal LLM judge
#[derive(Parser, Debug)]
#[command(
    name = "voyager-judge",
    about = "Evaluate web-agent task attempts with a multimodal LLM judge",
    after_help = "ENVIRONMENT VARIABLES:\n\
        OPENAI_API_KEY                 Judge API key\n\
        VOYAGER_JUDGE_REFERENCE_DATE   Date stated in the rubric (default: current month)\n\
        RUST_LOG                       Log filter (default: voyager_judge=info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Judge every task and append verdicts to the log
    Evaluate {
        /// Task corpus, one JSON task per line
        #[arg(short, long, env = config::ENV_TASKS_FILE, default_value = config::DEFAULT_TASKS_FILE)]
        tasks: PathBuf,

        /// JSON array of task ids to skip
        #[arg(
            short,
            long,
            env = config::ENV_IMPOSSIBLE_FILE,
            default_value = config::DEFAULT_IMPOSSIBLE_FILE
        )]
        impossible: PathBuf,

        /// Directory holding {id}.txt responses and {id}/*.png screenshots
        #[arg(short, long, env = config::ENV_RESULTS_DIR, default_value = config::DEFAULT_RESULTS_DIR)]
        results_dir: PathBuf,

        /// Verdict log to append to
        #[arg(short, long, env = config::ENV_OUTPUT_FILE, default_value = config::DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Tasks judged concurrently per batch
        #[arg(
            short,
            long,
            env = config::ENV_BATCH_SIZE,
            default_value_t = config::DEFAULT_BATCH_SIZE,
            value_parser = config::parse_batch_size
        )]
        batch_size: usize,

        /// Judge model name
        #[arg(long, env = config::ENV_JUDGE_MODEL, default_value = config::DEFAULT_JUDGE_MODEL)]
        model: String,

        /// Judge endpoint URL
        #[arg(long, env = config::ENV_JUDGE_ENDPOINT, default_value = config::DEFAULT_JUDGE_ENDPOINT)]
        endpoint: String,

        /// Only evaluate the first N tasks
        #[arg(long)]
        limit: Option<usize>,

        /// Resolve evidence for every task without calling the judge
        #[arg(long)]
        dry_run: bool,
    },

    /// Print overall and per-website accuracy from a verdict log
    Score {
        /// Verdict log to read
        #[arg(short, long, env = config::ENV_OUTPUT_FILE, default_value = config::DEFAULT_OUTPUT_FILE)]
        log: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voyager_judge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Evaluate {
            tasks,
            impossible,
            results_dir,
            output,
            batch_size,
            model,
            endpoint,
            limit,
            dry_run,
        }) => {
            let mut task_list = load_tasks(&tasks, &impossible)?;
            if let Some(limit) = limit {
                task_list.truncate(limit);
            }
            info!("Total tasks to process: {}", task_list.len());

            let mut judge_config = JudgeConfig::default().model(model);
            judge_config.endpoint = endpoint;
            if judge_config.api_key.is_none() && !dry_run {
                warn!("{} is not set; judge requests will be unauthenticated", config::ENV_API_KEY);
            }
            info!(model = %judge_config.model, endpoint = %judge_config.endpoint, "judge configured");

            let judge: Arc<dyn Judge> = Arc::new(OpenAiJudge::new(judge_config));
            let orchestrator = BatchOrchestrator::new(judge, batch_size, &results_dir, &output)?;

            if dry_run {
                let check = orchestrator.check_evidence(&task_list).await;
                println!(
                    "Evidence ready for {}/{} tasks ({} with screenshot)",
                    check.ready,
                    task_list.len(),
                    check.with_screenshot
                );
                for id in &check.missing {
                    println!("  missing: {}", id);
                }
                return Ok(());
            }

            let summary = orchestrator.run_all(&task_list).await?;
            info!(
                batches = summary.batches,
                written = summary.written,
                errors = summary.errors,
                by_result = ?summary.by_result,
                "evaluation finished"
            );
            println!("Results written to: {}", output.display());
        }

        Some(Commands::Score { log, json }) => {
            let report = compute_accuracy(&log)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
        }

        None => {
            println!("Voyager Judge - evaluate web-agent task attempts with an LLM judge");
            println!();
            println!("Usage: voyager-judge <COMMAND>");
            println!();
            println!("Commands:");
            println!("  evaluate  Judge every task and append verdicts to the log");
            println!("  score     Print overall and per-website accuracy from a verdict log");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}
