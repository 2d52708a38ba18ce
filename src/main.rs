//! NutriGuard CLI
//!
//! Serves malnutrition risk predictions over HTTP and runs one-off
//! predictions from the command line.

use clap::{Parser, Subcommand};
use nutriguard::{Config, Result};

#[derive(Parser)]
#[command(name = "nutriguard")]
#[command(about = "Malnutrition risk classification for children under five", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Override bind host
        #[arg(long)]
        host: Option<String>,
        /// Override bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Classify measurements from a JSON file (one object or an array)
    Predict {
        /// Input file
        input: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Serve { host, port } => commands::serve(config, host, port),
        Commands::Predict { input, format } => commands::predict(&config, &input, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Data { action } => match action {
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use nutriguard::data::Database;
    use nutriguard::features::{validate_ranges, RawInput};
    use nutriguard::predict::{format_prediction, PredictionService};
    use nutriguard::server::{self, AppState};
    use nutriguard::NutriError;
    use serde::Deserialize;
    use std::sync::Arc;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        if let Some(parent) = std::path::Path::new(&config.data.database_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.model.artifact_dir)?;
        println!(
            "Created {} for model artifacts",
            config.model.artifact_dir
        );

        println!("\nNext steps:");
        println!(
            "  1. Copy classifier.json, feature_names.json and class_names.json into {}",
            config.model.artifact_dir
        );
        println!("  2. Run 'nutriguard serve' to start the API");

        Ok(())
    }

    pub fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
        // The service must not accept traffic without a model
        let service = Arc::new(PredictionService::load(&config.model.artifact_dir)?);

        let db = match Database::open(&config.data.database_path) {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!(
                    "Storage unavailable at {}, records will not be saved: {}",
                    config.data.database_path,
                    e
                );
                None
            }
        };

        let state =
            AppState::new(service, db).with_persist_predictions(config.data.persist_predictions);
        let addr = format!(
            "{}:{}",
            host.unwrap_or(config.server.host),
            port.unwrap_or(config.server.port)
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(server::serve(state, &addr))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum InputFile {
        Many(Vec<RawInput>),
        One(RawInput),
    }

    pub fn predict(config: &Config, input: &str, format: OutputFormat) -> Result<()> {
        let content = std::fs::read_to_string(input)?;
        let inputs = match serde_json::from_str(&content)
            .map_err(|e| NutriError::Parse(format!("{}: {}", input, e)))?
        {
            InputFile::Many(inputs) => inputs,
            InputFile::One(input) => vec![input],
        };

        let service = PredictionService::load(&config.model.artifact_dir)?;

        let mut results = Vec::with_capacity(inputs.len());
        for raw in &inputs {
            validate_ranges(raw)?;
            results.push(service.classify(raw)?);
        }

        match format {
            OutputFormat::Table => {
                for result in &results {
                    print!("{}", format_prediction(result));
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&results)
                    .map_err(|e| NutriError::Parse(e.to_string()))?;
                println!("{}", json);
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let service = PredictionService::load(&config.model.artifact_dir)?;
        let info = service.model_info();

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:          {}", config.model.artifact_dir);
        println!("  Type:          {}", info.model_type);
        println!("  Probabilistic: {}", info.probabilistic);
        println!("  Classes:       {}", info.classes.join(", "));
        println!("  Features:");
        for (i, name) in info.features.iter().enumerate() {
            println!("    {:>2}. {}", i + 1, name);
        }
        if let Some(metadata) = &info.metadata {
            println!("  Metadata:");
            for (key, value) in metadata {
                println!("    {}: {}", key, value);
            }
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Records:     {}", stats.record_count);
        println!("  Predictions: {}", stats.prediction_count);
        for (class, count) in &stats.class_counts {
            println!("    {:<12} {}", class, count);
        }

        Ok(())
    }
}
