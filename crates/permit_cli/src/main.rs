use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use permit_cli::{check_payload, hash_payload, normalize_payload, CliError};
use permit_core::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ActionArg {
    Insert,
    Select,
    Update,
    Delete,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Insert => Action::Insert,
            ActionArg::Select => Action::Select,
            ActionArg::Update => Action::Update,
            ActionArg::Delete => Action::Delete,
        }
    }
}

#[derive(Parser)]
#[command(name = "permit", about = "Inspect declarative permission documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode and validate a permission document
    Check {
        payload: PathBuf,
        #[arg(long, value_enum)]
        action: ActionArg,
        /// Known columns of the table, for existence checks
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Re-emit a document in compiled canonical form
    Normalize {
        payload: PathBuf,
        #[arg(long, value_enum)]
        action: ActionArg,
    },
    /// Print the canonical policy hash of a document
    Hash { payload: PathBuf },
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Check {
            payload,
            action,
            columns,
        } => {
            let report = check_payload(&payload, action.into(), &columns)?;
            let rendered = serde_json::to_string_pretty(&report)
                .map_err(|err| CliError::Json(err.to_string()))?;
            println!("{}", rendered);
            if report.valid {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Normalize { payload, action } => {
            println!("{}", normalize_payload(&payload, action.into())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Hash { payload } => {
            println!("{}", hash_payload(&payload)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("permit: {}", err);
            ExitCode::FAILURE
        }
    }
}
