use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict the genres of a movie summary
    Predict {
        /// Movie summary text
        summary: String,

        /// Also print the probability of every genre
        #[arg(long)]
        scores: bool,
    },

    /// Translate one or more texts into a target language
    Translate {
        /// Target language (code or name, e.g. "ur" or "Urdu")
        #[arg(short, long)]
        language: String,

        /// Texts to translate, in order
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Predict genres and translate a summary in one go
    Analyze {
        /// Movie summary text
        summary: String,

        /// Presentation language (code or name)
        #[arg(short, long, default_value = "en")]
        language: String,
    },

    /// List supported languages and their translation models
    Languages,

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "filmception.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translate() {
        let args = Args::parse_from(["filmception", "-v", "translate", "-l", "ko", "first", "second"]);
        assert!(args.verbose);
        match args.command {
            Commands::Translate { language, texts } => {
                assert_eq!(language, "ko");
                assert_eq!(texts, vec!["first", "second"]);
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_analyze_defaults_to_english() {
        let args = Args::parse_from(["filmception", "analyze", "A detective investigates a murder."]);
        match args.command {
            Commands::Analyze { language, .. } => assert_eq!(language, "en"),
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_translate_requires_text() {
        assert!(Args::try_parse_from(["filmception", "translate", "-l", "ur"]).is_err());
    }
}
