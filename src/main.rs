//! Filmception - Movie Summary Genre Prediction and Translation
//!
//! Command line front end: predicts genres, translates summaries and runs
//! both together, printing the text handed to speech synthesis.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use filmception::cli::{Args, Commands};
use filmception::config::Config;
use filmception::language::Language;
use filmception::translate::{MarianLoader, TranslationDispatcher, TranslationModelRegistry, TranslationOutcome};
use filmception::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "filmception.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting Filmception - Movie Summary Genre Prediction and Translation");

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Predict { summary, scores } => {
            let workflow = Workflow::from_config(&config)?;
            let prediction = workflow.predict_genres(&summary)?;

            if prediction.is_empty() {
                println!("Predicted genres: (none)");
            } else {
                println!("Predicted genres: {}", prediction);
            }

            if scores {
                println!("\n{:<24} {:>11}", "Genre", "Probability");
                println!("{}", "-".repeat(36));
                for (genre, probability) in workflow.classifier().scores(&summary) {
                    println!("{:<24} {:>11.4}", genre, probability);
                }
            }
        }
        Commands::Translate { language, texts } => {
            let language: Language = language.parse()?;
            let dispatcher = Arc::new(build_dispatcher(&config)?);

            let spinner = spinner(&format!("Translating {} text(s) to {}...", texts.len(), language))?;
            let outcome = tokio::task::spawn_blocking(move || match language.translation_code() {
                None => Ok(TranslationOutcome::identity(texts)),
                Some(code) => dispatcher.translate_all_code(&texts, code),
            })
            .await??;
            spinner.finish_and_clear();

            for line in &outcome.translations {
                println!("{}", line);
            }
            report_persistence(&outcome);
        }
        Commands::Analyze { summary, language } => {
            let language: Language = language.parse()?;
            let workflow = Workflow::from_config(&config)?;

            let spinner = spinner(&format!("Analyzing summary ({})...", language))?;
            let analysis = workflow.analyze(&summary, language).await?;
            spinner.finish_and_clear();

            println!("Predicted genres: {}", analysis.genres);
            println!("\n{} summary:\n{}", language, analysis.speech.text);
            report_persistence(&analysis.translation);
            info!(
                "Speech hand-off ready: {} chars, language '{}'",
                analysis.speech.text.chars().count(),
                analysis.speech.language_code
            );
        }
        Commands::Languages => {
            let dispatcher = build_dispatcher(&config)?;

            println!("\nSupported Languages:");
            println!("{:<10} {:<6} {:<40}", "Name", "Code", "Model");
            println!("{}", "-".repeat(56));
            println!(
                "{:<10} {:<6} {:<40}",
                Language::English.name(),
                Language::English.code(),
                "(source language, no translation)"
            );
            for (code, source) in dispatcher.registry().sources() {
                println!("{:<10} {:<6} {:<40}", code.language().name(), code, source.repo);
            }
            println!(
                "\nTranslations are written to {}",
                dispatcher.output_dir().display()
            );
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite",
                    output.display()
                );
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

fn build_dispatcher(config: &Config) -> Result<TranslationDispatcher> {
    let loader = MarianLoader::new(&config.translate);
    let registry = TranslationModelRegistry::from_config(Box::new(loader), &config.translate)?;
    Ok(TranslationDispatcher::new(Arc::new(registry), &config.translate.output_dir))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn report_persistence(outcome: &TranslationOutcome) {
    match (&outcome.output_path, &outcome.persistence_error) {
        (Some(_), Some(e)) => eprintln!("Warning: {}", e),
        (Some(path), None) => println!("\nSaved to {}", path.display()),
        (None, _) => {}
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".filmception").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "filmception.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("filmception.log").display()
    );

    Ok(())
}
