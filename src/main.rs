use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use console::style;

use chattermill::PipelineError;
use chattermill::config::Settings;
use chattermill::reddit::RedditClient;
use chattermill::stages;

#[derive(Parser, Debug)]
#[command(name = "chattermill", version, about)]
struct Args {
    /// Task to resolve, e.g. `join` or `process-politics`.
    #[arg(default_value = "join")]
    target: String,

    /// Directory for the per-stage output files.
    #[arg(long, default_value = "data")]
    data_dir: Utf8PathBuf,

    /// Sentinel file marking a completed run.
    #[arg(long, default_value = "done.txt")]
    sentinel: Utf8PathBuf,

    /// Number of hot threads fetched per source.
    #[arg(long, default_value_t = stages::THREAD_LIMIT)]
    limit: u32,

    /// Print the task graph as a Mermaid diagram and exit.
    #[arg(long)]
    graph: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let settings = Settings::from_env()?;
    let client = Arc::new(RedditClient::new(&settings)?);

    let sources: Vec<&str> = stages::DEFAULT_SOURCES.to_vec();
    let plan = stages::assemble(client, &args.data_dir, &args.sentinel, &sources, args.limit);

    if args.graph {
        print!("{}", plan.blueprint);
        return Ok(());
    }

    let target = match plan.lookup(&args.target) {
        Some(handle) => handle,
        None => {
            let known: Vec<&str> = plan.task_names().collect();
            eprintln!("Known tasks: {}", known.join(", "));
            return Err(PipelineError::UnknownTask(args.target.clone()).into());
        }
    };

    eprintln!(
        "Resolving {} target {}",
        style("chattermill").red(),
        style(&args.target).blue()
    );

    let pipeline = plan.blueprint.finish();
    let resolution = pipeline.resolve(target)?;

    eprintln!(
        "Done: {} task(s) ran, {} skipped",
        resolution.ran(),
        resolution.skipped()
    );

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chattermill=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
