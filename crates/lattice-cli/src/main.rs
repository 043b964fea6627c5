//! Lattice CLI - replays command scripts against a document

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lattice::prelude::*;
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lattice")]
#[command(author, version, about = "Spreadsheet document engine tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch every command of a JSON script, in order
    Replay {
        /// Script file: an array of commands or {"commands": [...]}
        script: PathBuf,

        /// Start from this document instead of an empty one
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Print the exported document after the script
        #[arg(short, long)]
        export: bool,

        /// Pretty-print the exported document
        #[arg(short, long)]
        pretty: bool,

        /// Write the exported document to a file (implies --export)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop at the first rejected command and fail
        #[arg(long)]
        strict: bool,
    },

    /// Show information about a document
    Info {
        /// Document file (JSON)
        document: PathBuf,
    },
}

/// A replay script
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Script {
    Commands(Vec<Command>),
    Wrapped { commands: Vec<Command> },
}

impl Script {
    fn into_commands(self) -> Vec<Command> {
        match self {
            Script::Commands(commands) | Script::Wrapped { commands } => commands,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            document,
            export,
            pretty,
            output,
            strict,
        } => {
            let mut engine = match &document {
                Some(path) => open_document(path)?,
                None => Engine::new(),
            };
            let commands = read_script(&script)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let rejected = replay(&mut engine, commands, strict, &mut out)?;
            if strict && rejected > 0 {
                bail!("script stopped at a rejected command");
            }
            if export || output.is_some() {
                let data = engine.export();
                let json = if pretty { data.to_json_pretty()? } else { data.to_json()? };
                match output {
                    Some(path) => {
                        std::fs::write(&path, json)
                            .with_context(|| format!("Failed to write '{}'", path.display()))?;
                        eprintln!("Wrote document to '{}'", path.display());
                    }
                    None => writeln!(out, "{}", json).context("Failed to write to stdout")?,
                }
            }
            if rejected > 0 {
                eprintln!("{} command(s) rejected", rejected);
            }
            Ok(())
        }
        Commands::Info { document } => {
            let engine = open_document(&document)?;
            let stdout = io::stdout();
            show_info(&document, &engine, &mut stdout.lock())
        }
    }
}

fn read_script(path: &Path) -> Result<Vec<Command>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    parse_script(&text).with_context(|| format!("Invalid script '{}'", path.display()))
}

fn parse_script(text: &str) -> Result<Vec<Command>> {
    let script: Script = serde_json::from_str(text)?;
    Ok(script.into_commands())
}

fn open_document(path: &Path) -> Result<Engine> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let data = WorkbookData::from_json(&text)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;
    Engine::from_data(&data, EngineConfig::default())
        .with_context(|| format!("Failed to open '{}'", path.display()))
}

/// Dispatch `commands` in order, one report line each. Returns the number of rejections.
fn replay(
    engine: &mut Engine,
    commands: Vec<Command>,
    strict: bool,
    out: &mut impl Write,
) -> Result<usize> {
    let mut rejected = 0;
    for (index, command) in commands.into_iter().enumerate() {
        let kind = command_kind(&command);
        let result = engine.dispatch(command);
        writeln!(out, "{:>4}  {:<34} {}", index + 1, kind, result)?;
        if !result.is_success() {
            rejected += 1;
            if strict {
                break;
            }
        }
    }
    Ok(rejected)
}

/// The serialized tag of a command, e.g. `UPDATE_CELL`
fn command_kind(command: &Command) -> String {
    serde_json::to_value(command)
        .ok()
        .and_then(|value| value.get("type").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| "?".to_string())
}

fn show_info(path: &Path, engine: &Engine, out: &mut impl Write) -> Result<()> {
    let data = engine.export();
    writeln!(out, "File: {}", path.display())?;
    writeln!(out, "Version: {}", data.version)?;
    writeln!(out, "Sheets: {}", data.sheets.len())?;

    for (i, sheet) in data.sheets.iter().enumerate() {
        let active = data.active_sheet.as_ref() == Some(&sheet.id);
        writeln!(out)?;
        writeln!(
            out,
            "  Sheet {}: \"{}\" ({}){}",
            i,
            sheet.name,
            sheet.id,
            if active { " *" } else { "" }
        )?;
        writeln!(out, "    Size: {} rows x {} columns", sheet.rows, sheet.cols)?;
        writeln!(out, "    Cells: {}", sheet.cells.len())?;
        let formulas = sheet.cells.values().filter(|cell| cell.content.starts_with('=')).count();
        writeln!(out, "    Formulas: {}", formulas)?;
        writeln!(out, "    Merges: {}", sheet.merges.len())?;
        writeln!(out, "    Conditional formats: {}", sheet.conditional_formats.len())?;
        writeln!(out, "    Tables: {}", sheet.tables.len())?;
        writeln!(out, "    Figures: {}", sheet.figures.len())?;
    }
    if !data.custom_colors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Custom colors: {}", data.custom_colors.join(", "))?;
    }

    Ok(())
}
