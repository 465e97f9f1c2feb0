use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agreewise_core::commands::{HandlerResponse, RequestHandler};
use agreewise_core::config::CoreConfig;
use agreewise_core::services::ingest::UploadedFile;
use contracts::assets::write_default_rulebook;

mod logging;

// Rate-limit key for requests issued from this process.
const LOCAL_CLIENT: &str = "local";

#[derive(Parser)]
#[command(
    name = "agreewise",
    version,
    about = "Heuristic risk scoring for contract documents"
)]
struct Cli {
    /// Directory holding agreewise.toml; relative config paths resolve against it
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Score contract text given inline, from a file, or on stdin
    Analyze {
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Print the score breakdown instead of the response
        #[arg(long)]
        explain: bool,
    },
    /// Extract text from a PDF and score it
    Upload { path: PathBuf },
    /// Print the active rulebook as JSON
    Rules,
    /// Write the default rulebook TOML into a directory (existing files are kept)
    InitRules {
        #[arg(long, default_value = "rules")]
        dir: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let cfg = CoreConfig::load(&cli.root)?;
    logging::init(cli.debug, cfg.logging.level.as_deref());
    cfg.log_source(&cli.root);

    match cli.cmd {
        Cmd::Analyze { text, file, explain } => {
            let text = read_input(text, file.as_deref())?;
            let handler = RequestHandler::new(cfg)?;
            if explain {
                let evaluation = handler.scorer().evaluate(&text);
                println!("{}", serde_json::to_string_pretty(&evaluation)?);
                return Ok(ExitCode::SUCCESS);
            }
            let body = serde_json::json!({ "text": text }).to_string();
            emit(&handler.analyze(LOCAL_CLIENT, Some(&body)))
        }
        Cmd::Upload { path } => {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let handler = RequestHandler::new(cfg)?;
            let file = UploadedFile::new(filename, bytes);
            emit(&handler.upload(LOCAL_CLIENT, Some(&file)))
        }
        Cmd::Rules => {
            let scorer = cfg.rules.scorer()?;
            println!("{}", serde_json::to_string_pretty(scorer.rulebook())?);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::InitRules { dir } => {
            let dir = if dir.is_absolute() { dir } else { cli.root.join(dir) };
            let created = write_default_rulebook(&dir)?;
            if created.is_empty() {
                println!("rulebook already present in {}", dir.display());
            } else {
                for name in created {
                    println!("wrote {}", dir.join(name).display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(t) = text {
        return Ok(t);
    }
    if let Some(path) = file {
        return fs::read_to_string(path).with_context(|| format!("read {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("read contract text from stdin")?;
    Ok(buf)
}

fn emit(resp: &HandlerResponse) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&resp.body)?);
    Ok(if resp.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
