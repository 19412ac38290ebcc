use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use readitlater_engine::{
    sanitize_file_name, AtomicFileWriter, EngineConfig, EngineEvent, EngineHandle, Input, Note,
    PersistError,
};
use readitlater_logging::{engine_info, LogDestination};

mod settings_file;

const JOB_ID: u64 = 1;
const MAX_NAME_ATTEMPTS: usize = 100;

/// Save a URL or a text snippet as a markdown note.
#[derive(Debug, Parser)]
#[command(name = "readitlater", version, about)]
struct Cli {
    /// RON settings file; anything it leaves out keeps its default.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Write the default settings to the `--settings` file and exit.
    #[arg(long, requires = "settings")]
    init_settings: bool,

    /// Vault root the inbox and asset directories are relative to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    vault: PathBuf,

    /// Also log to ./readitlater.log.
    #[arg(long)]
    log_file: bool,

    #[arg(short, long)]
    verbose: bool,

    /// URL or text to save. `-` reads standard input.
    #[arg(value_name = "INPUT", required_unless_present = "init_settings")]
    input: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let destination = if cli.log_file {
        LogDestination::Both
    } else {
        LogDestination::Terminal
    };
    readitlater_logging::initialize(destination, level);

    if cli.init_settings {
        if let Some(path) = cli.settings.as_deref() {
            settings_file::write_default_settings(path)?;
            println!("{}", path.display());
        }
        return Ok(());
    }

    let settings = settings_file::load_settings(cli.settings.as_deref())?;
    let raw = read_input(&cli.input)?;
    let inbox = cli.vault.join(&settings.inbox_dir);

    let engine = EngineHandle::new(EngineConfig::new(settings, &cli.vault));
    engine.enqueue(JOB_ID, Input::classify(&raw));

    while let Some(event) = engine.recv() {
        match event {
            EngineEvent::Progress { stage, .. } => engine_info!("{:?}", stage),
            EngineEvent::Notice { notice, .. } => eprintln!("warning: {notice}"),
            EngineEvent::JobCompleted { result, .. } => {
                let note = result.context("could not create note")?;
                let path = write_note(&inbox, &note)?;
                println!("{}", path.display());
                return Ok(());
            }
        }
    }
    bail!("engine stopped before the note was created")
}

fn read_input(words: &[String]) -> Result<String> {
    let raw = if let [single] = words {
        if single == "-" {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read standard input")?;
            buffer
        } else {
            single.clone()
        }
    } else {
        words.join(" ")
    };
    if raw.trim().is_empty() {
        bail!("nothing to save: input is empty");
    }
    Ok(raw)
}

/// Write the note under its sanitized name, appending ` 1`, ` 2`, ... when
/// that name is already taken.
fn write_note(dir: &Path, note: &Note) -> Result<PathBuf> {
    let writer = AtomicFileWriter::new(dir);
    let file_name = sanitize_file_name(&note.file_name);
    let (stem, ext) = file_name
        .rsplit_once('.')
        .unwrap_or((file_name.as_str(), "md"));

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem} {attempt}.{ext}")
        };
        match writer.write_new(&candidate, &note.content) {
            Ok(path) => return Ok(path),
            Err(PersistError::AlreadyExists(_)) => continue,
            Err(err) => return Err(err).context("failed to write note"),
        }
    }
    bail!("no free file name for {file_name} in {}", dir.display())
}
