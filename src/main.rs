use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use content_engine::commands::{ask, chat, ingest, list_documents, setup, show_status};
use content_engine::config::{DEFAULT_DATA_DIR, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "content-engine")]
#[command(about = "Ask questions about a directory of PDF documents using a local LLM")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, documents/ and the vector index
    #[arg(long, global = true, env = "CONTENT_ENGINE_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directories and a default configuration
    Setup,
    /// Configure Ollama connection and generation settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index the PDF documents
    Ingest {
        /// Clear the index and rebuild it from scratch
        #[arg(long)]
        force: bool,
    },
    /// List the available PDF documents
    List,
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,
        /// Number of documents to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Start an interactive question session
    Chat {
        /// Number of documents to retrieve as context
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show Ollama, index and document status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_path();

    match cli.command {
        Commands::Setup => {
            setup(data_dir)?;
        }
        Commands::Config { show } => {
            if show {
                show_config(data_dir)?;
            } else {
                run_interactive_config(data_dir)?;
            }
        }
        Commands::Ingest { force } => {
            ingest(data_dir, force).await?;
        }
        Commands::List => {
            list_documents(data_dir)?;
        }
        Commands::Ask { question, top_k } => {
            ask(data_dir, &question, top_k).await?;
        }
        Commands::Chat { top_k } => {
            chat(data_dir, top_k).await?;
        }
        Commands::Status => {
            show_status(data_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["content-engine", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::List));
        }
    }

    #[test]
    fn ask_command_with_question() {
        let cli = Cli::try_parse_from(["content-engine", "ask", "What is the capital of France?"])
            .expect("should parse");

        match cli.command {
            Commands::Ask { question, top_k } => {
                assert_eq!(question, "What is the capital of France?");
                assert_eq!(top_k, None);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn ask_command_requires_question() {
        let cli = Cli::try_parse_from(["content-engine", "ask"]);

        assert!(cli.is_err());
        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn chat_command_with_top_k() {
        let cli = Cli::try_parse_from(["content-engine", "chat", "--top-k", "3"])
            .expect("should parse");

        assert!(matches!(cli.command, Commands::Chat { top_k: Some(3) }));
    }

    #[test]
    fn ingest_force_flag() {
        let cli = Cli::try_parse_from(["content-engine", "ingest", "--force"])
            .expect("should parse");

        assert!(matches!(cli.command, Commands::Ingest { force: true }));
    }

    #[test]
    fn data_dir_is_global() {
        let cli = Cli::try_parse_from(["content-engine", "status", "--data-dir", "/tmp/engine"])
            .expect("should parse");

        assert_eq!(cli.data_dir, PathBuf::from("/tmp/engine"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["content-engine", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["content-engine", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["content-engine", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
