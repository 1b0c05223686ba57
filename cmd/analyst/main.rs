use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[path = "../../src/analyst/mod.rs"]
mod analyst;
#[path = "../../src/shared/mod.rs"]
mod shared;

use analyst::repair::Outcome;
use analyst::workspace::RequestContext;
use analyst::Analyst;
use shared::config::ConfigArgs;

const EXIT_EXHAUSTED: u8 = 2;

#[derive(Parser)]
#[command(name = "analyst")]
#[command(about = "Answer questions about local data files with a generated script")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a question file against optional attachments and print the JSON answer
    Solve {
        /// File holding the natural-language questions
        #[arg(long)]
        questions: PathBuf,

        /// Data files placed next to the questions
        attachments: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show CLI version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("analyst {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Solve {
            questions,
            attachments,
            config,
        } => match cmd_solve(&questions, &attachments, &config).await {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn cmd_solve(
    questions: &Path,
    attachments: &[PathBuf],
    config: &ConfigArgs,
) -> Result<ExitCode> {
    let config = config.load()?;
    let _logging = shared::logging::init_cli_logging();

    let analyst = Analyst::from_config(&config)?;
    let ctx = RequestContext::from_paths(questions, attachments)?;

    match analyst.solve(&ctx).await? {
        Outcome::Succeeded { value, .. } => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Exhausted(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::from(EXIT_EXHAUSTED))
        }
    }
}
