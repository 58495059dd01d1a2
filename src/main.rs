use std::fs;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use page_translator::progress::{LogSink, ProgressEvent, ProgressSink};
use page_translator::{ControlCommand, SessionControl};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "page-translator",
    version,
    about = "Translate the text of an HTML page in place with an LLM service"
)]
struct Cli {
    /// HTML file to translate (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Write the translated page here instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Target language code (default from settings: es)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Translation service: openai, azure, anthropic, google or custom
    #[arg(short = 's', long = "service")]
    service: Option<String>,

    /// Number of batches translated at the same time (1-100)
    #[arg(short = 'c', long = "concurrency")]
    concurrency: Option<usize>,

    /// Text units per request
    #[arg(short = 'b', long = "batch-size")]
    batch_size: Option<usize>,

    /// Context sent with every batch (defaults to the page title)
    #[arg(long = "context")]
    context: Option<String>,

    /// Only translate the first element matching this CSS selector
    #[arg(long = "selector")]
    selector: Option<String>,

    /// Do not mark translated elements with data-translated
    #[arg(long = "no-indicator")]
    no_indicator: bool,

    /// Do not register hover groups for translated elements
    #[arg(long = "no-hover")]
    no_hover: bool,

    /// Send every batch to the service even when it was translated before
    #[arg(long = "no-cache")]
    no_cache: bool,

    /// Show known language codes and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Print progress lines to stderr
    #[arg(long = "progress")]
    progress: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> page_translator::Config {
        page_translator::Config {
            lang: self.lang.clone(),
            service: self.service.clone(),
            concurrency: self.concurrency,
            batch_size: self.batch_size,
            context: self.context.clone(),
            selector: self.selector.clone(),
            settings_path: self.read_settings.clone(),
            no_indicator: self.no_indicator,
            no_hover: self.no_hover,
            no_cache: self.no_cache,
            show_languages: self.show_languages,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    page_translator::logging::init(cli.verbose)?;

    let input = if cli.show_languages {
        None
    } else {
        Some(read_input(&cli)?)
    };

    let control = SessionControl::new();
    watch_ctrl_c(control.clone());
    if cli.input.is_some() {
        read_commands(control.clone());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("{}", event.report().status);
        }
    });

    let sink: &dyn ProgressSink = if cli.progress { &tx } else { &LogSink };
    let result = page_translator::run(cli.config(), input, control, sink).await;
    drop(tx);
    let _ = printer.await;
    let output = result?;

    match &cli.output {
        Some(path) => fs::write(path, &output.text)
            .with_context(|| format!("failed to write output: {}", path.display()))?,
        None => println!("{}", output.text),
    }
    if let Some(outcome) = output.outcome {
        if outcome.failed > 0 {
            warn!("{} of {} batches failed", outcome.failed, outcome.total);
        }
        if cli.verbose || cli.progress {
            eprintln!(
                "batches: {}/{} (failed: {}, skipped: {}), tokens: {}{}",
                outcome.completed,
                outcome.total,
                outcome.failed,
                outcome.skipped,
                outcome.tokens,
                if outcome.stopped { ", stopped" } else { "" }
            );
        }
    }
    Ok(())
}

fn read_input(cli: &Cli) -> Result<String> {
    match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input: {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .with_context(|| "failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn watch_ctrl_c(control: SessionControl) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stopping after in-flight batches...");
            control.stop();
        }
    });
}

/// Accepts `pause`, `resume` and `stop` lines on stdin while a file is being
/// translated.
fn read_commands(control: SessionControl) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlCommand>() {
                Ok(command) => {
                    control.apply(command);
                }
                Err(err) => eprintln!("{}", err),
            }
        }
    });
}
