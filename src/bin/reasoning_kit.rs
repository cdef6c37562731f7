use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reasoning_kit::Settings;
use reasoning_kit::config::load_env_file;
use reasoning_kit::tools::reasoning::build_registry;
use serde_json::Value;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Reasoning Kit - ask upstream reasoning models through named capabilities
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to environment file
    #[arg(long, default_value = ".env")]
    env: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List enabled capabilities with their parameter schemas
    List,

    /// Invoke one capability and print its result
    Call {
        /// Capability name, e.g. deepseek_reasoning
        #[arg(value_name = "CAPABILITY")]
        capability: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    load_env_file(&cli.env);
    let settings = Settings::from_env();
    let registry = build_registry(&settings)?;

    match cli.command {
        Commands::List => {
            for tool in registry.tools() {
                println!("{}: {}", tool.name(), tool.description());
                println!("{}", serde_json::to_string_pretty(&tool.json_schema())?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Call { capability, args } => {
            let arguments = serde_json::from_str::<Value>(&args)?;
            let result = registry.call(&capability, arguments).await?;

            if result.is_error {
                eprintln!("{}", result.text);
                Ok(ExitCode::FAILURE)
            } else {
                println!("{}", result.text);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
