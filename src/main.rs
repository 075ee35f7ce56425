use std::path::Path;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookindex::logging::init().context("init logging")?;

    let cli = bookindex::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    bookindex::env::load_dotenv(Path::new(&cli.command.layout().root)).context("load .env")?;

    match cli.command {
        bookindex::cli::Command::Extract(args) => {
            bookindex::extract::run(args).await.context("extract")?;
        }
        bookindex::cli::Command::Consolidate(args) => {
            bookindex::consolidate::run(args)
                .await
                .context("consolidate")?;
        }
        bookindex::cli::Command::Classify(args) => {
            bookindex::classify::run(args).await.context("classify")?;
        }
        bookindex::cli::Command::Regenerate(args) => {
            bookindex::publish::regenerate(args).context("regenerate")?;
        }
    }

    Ok(())
}
