use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pass 1: propose candidate subjects per chapter and write `candidates.json`.
    #[command(alias = "pass1")]
    Extract(ExtractArgs),
    /// Merge near-duplicate candidates in batches into `candidates_consolidated.json`.
    Consolidate(ConsolidateArgs),
    /// Pass 2: tag chapters against the approved subjects and render the index.
    #[command(alias = "pass2")]
    Classify(ClassifyArgs),
    /// Rebuild the index and LaTeX from saved pass-2 results (no model calls).
    Regenerate(RegenerateArgs),
}

impl Command {
    pub fn layout(&self) -> &LayoutArgs {
        match self {
            Command::Extract(args) => &args.layout,
            Command::Consolidate(args) => &args.layout,
            Command::Classify(args) => &args.layout,
            Command::Regenerate(args) => &args.layout,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct LayoutArgs {
    /// Book root containing the `NN_name` chapter directories and `main.tex`.
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Directory for intermediate JSON and the rendered index (default: `<root>/index`).
    #[arg(long)]
    pub out_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LlmEngine {
    Gemini,
    Openai,
    Command,
}

#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// Model backend.
    #[arg(long, value_enum, default_value_t = LlmEngine::Gemini)]
    pub engine: LlmEngine,

    /// Model name (default depends on the engine).
    #[arg(long)]
    pub model: Option<String>,

    /// API base URL override.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Sampling temperature (omitted from requests when unset).
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum model calls in flight.
    #[arg(long, default_value_t = 10)]
    pub concurrency: usize,

    /// Per-call timeout in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Extra attempts after a failed call.
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// Program to run when `--engine=command` (prompt on stdin, reply on stdout).
    #[arg(long)]
    pub command: Option<String>,

    /// Arguments for `--command` (after `--`).
    #[arg(last = true, allow_hyphen_values = true)]
    pub command_args: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Candidate subjects per consolidation call.
    #[arg(long, default_value_t = 150)]
    pub batch_size: usize,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Approved subjects file (default: `<out-dir>/candidates.json`).
    #[arg(long)]
    pub approved: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegenerateArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Approved subjects file (default: `<out-dir>/candidates.json`).
    #[arg(long)]
    pub approved: Option<String>,
}
