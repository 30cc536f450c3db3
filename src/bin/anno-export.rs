use std::{collections::HashMap, path::PathBuf, sync::mpsc, thread};

use anno_export::{
    ModuleConfiguration, ReadFromDiscriminants, StepID, WriteAsDiscriminants,
    error::ExportError,
    workflow::{RunSummary, StatusMessage, Workflow, execute_from_file},
};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use itertools::Itertools;
use lazy_static::lazy_static;
use strum::IntoEnumIterator;
use tabled::{Table, Tabled, settings::Style};
use tracing_subscriber::filter::EnvFilter;

lazy_static! {
    static ref USE_ANSI_COLORS: bool = std::env::var("NO_COLOR").is_err();
}

/// Export annotations as W3C Web Annotations, TEI stand-off markup or tables
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the import and export steps of a workflow file.
    Run {
        /// The path to the workflow file.
        workflow_file: PathBuf,
        /// Replace `$VARIABLE` references in the workflow file with environment variables.
        #[arg(long)]
        env: bool,
    },
    /// Check that a workflow file can be read. Invalid files lead to a non-zero exit code.
    Validate {
        /// The path to the workflow file.
        workflow_file: PathBuf,
        /// Replace `$VARIABLE` references in the workflow file with environment variables.
        #[arg(long)]
        env: bool,
    },
    /// List the supported import and export formats.
    List,
    /// Show the documentation and configuration of a format.
    Info {
        /// Name of the format, e.g. `tei`.
        name: String,
    },
}

pub fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("anno_export=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match Cli::parse().command {
        Command::Run { workflow_file, env } => run(workflow_file, env),
        Command::Validate { workflow_file, env } => validate(workflow_file, env),
        Command::List => {
            list_formats();
            Ok(())
        }
        Command::Info { name } => format_info(&name),
    }
}

/// One progress bar per workflow step, with messages printed above them.
struct StepDisplay {
    multi: MultiProgress,
    bars: HashMap<StepID, ProgressBar>,
    style: ProgressStyle,
}

impl StepDisplay {
    fn new() -> anyhow::Result<Self> {
        let style = ProgressStyle::with_template(
            "{prefix:>3} {spinner:.blue} {msg:40} [{bar:20.blue}] {pos}/{len} {elapsed}",
        )?
        .progress_chars("=> ");
        Ok(StepDisplay {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            style,
        })
    }

    fn update(&mut self, message: StatusMessage) -> std::io::Result<()> {
        match message {
            StatusMessage::StepsCreated(steps) => {
                for (position, id) in steps.into_iter().enumerate() {
                    let bar = self.multi.add(ProgressBar::new(0));
                    bar.set_style(self.style.clone());
                    bar.set_prefix(format!("{}.", position + 1));
                    bar.set_message(id.to_string());
                    self.bars.insert(id, bar);
                }
            }
            StatusMessage::Info(msg) => self.multi.println(msg)?,
            StatusMessage::Warning(msg) => self.multi.println(warning(&msg))?,
            StatusMessage::Progress {
                id,
                total_work,
                finished_work,
            } => {
                // workflow level reports have no bar of their own
                if let Some(bar) = self.bars.get(&id) {
                    if let Some(total_work) = total_work {
                        bar.set_length(total_work as u64);
                    }
                    bar.set_position(finished_work as u64);
                }
            }
            StatusMessage::StepDone { id } => {
                if let Some(bar) = self.bars.get(&id) {
                    bar.finish();
                }
            }
        }
        Ok(())
    }
}

fn warning(msg: &str) -> String {
    let msg = format!("warning: {msg}");
    if *USE_ANSI_COLORS {
        console::style(msg).yellow().to_string()
    } else {
        msg
    }
}

fn run(workflow_file: PathBuf, read_env: bool) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || execute_from_file(&workflow_file, read_env, Some(tx)));

    let mut display = StepDisplay::new()?;
    for message in rx {
        display.update(message)?;
    }
    let summary = worker.join().map_err(|_| ExportError::JoinHandle)??;
    print_summary(&summary);
    Ok(())
}

#[derive(Tabled)]
struct StepRow {
    step: String,
    exported: usize,
    skipped: usize,
    unclassified: usize,
}

fn print_summary(summary: &RunSummary) {
    println!("Imported {} annotation(s)", summary.imported);
    if summary.exports.is_empty() {
        println!("The workflow has no export steps");
        return;
    }
    let rows = summary.exports.iter().map(|(id, report)| StepRow {
        step: id.to_string(),
        exported: report.exported,
        skipped: report.skipped.len(),
        unclassified: report.unclassified.len(),
    });
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

fn validate(workflow_file: PathBuf, read_env: bool) -> anyhow::Result<()> {
    let workflow = Workflow::try_from((workflow_file, read_env))?;
    println!(
        "Workflow for scope {} is valid: {} import step(s), {} export step(s)",
        workflow.scope(),
        workflow.import_steps().len(),
        workflow.export_steps().map_or(0, Vec::len)
    );
    Ok(())
}

#[derive(Tabled)]
struct FormatRow {
    format: String,
    step: &'static str,
    description: String,
}

/// The first paragraph of a module documentation on a single line.
fn summary_line(doc: &str) -> String {
    doc.split("\n\n")
        .next()
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .join(" ")
}

fn list_formats() {
    let importers = ReadFromDiscriminants::iter().map(|m| FormatRow {
        format: m.as_ref().to_string(),
        step: "import",
        description: summary_line(m.module_doc()),
    });
    let exporters = WriteAsDiscriminants::iter().map(|m| FormatRow {
        format: m.as_ref().to_string(),
        step: "export",
        description: summary_line(m.module_doc()),
    });
    let mut table = Table::new(importers.chain(exporters));
    table.with(Style::modern());
    println!("{table}");
    println!("Use `anno-export info <format>` to show the configuration of a format.");
}

fn print_markdown(text: &str) {
    if *USE_ANSI_COLORS {
        termimad::print_text(text);
    } else {
        print!("{text}");
    }
}

fn format_info(name: &str) -> anyhow::Result<()> {
    let name = name.to_lowercase();
    let importers = ReadFromDiscriminants::iter()
        .filter(|m| m.as_ref() == name)
        .map(|m| ("importer", m.module_doc().to_string(), m.module_configs()));
    let exporters = WriteAsDiscriminants::iter()
        .filter(|m| m.as_ref() == name)
        .map(|m| ("exporter", m.module_doc().to_string(), m.module_configs()));
    let modules: Vec<(&str, String, Vec<ModuleConfiguration>)> =
        importers.chain(exporters).collect();
    if modules.is_empty() {
        anyhow::bail!("No format named {name}. Run `anno-export list` to see all formats.");
    }

    for (kind, doc, fields) in modules {
        print_markdown(&format!("# {name} ({kind})\n\n{doc}\n\n"));
        if fields.is_empty() {
            println!("No configuration options.\n");
        } else {
            let mut table = Table::new(fields);
            table.with(Style::modern());
            println!("{table}\n");
        }
    }
    Ok(())
}
