//! Model Prediction Service CLI
//!
//! A command-line tool for checking service health, inspecting loaded
//! models and requesting predictions from the model server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::predict::{CustomerArgs, HouseArgs, WineArgs};
use commands::{predict, status};
use std::path::PathBuf;

/// Model Prediction Service CLI
#[derive(Parser)]
#[command(name = "mps")]
#[command(author, version, about = "CLI for the Model Prediction Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via MPS_API_URL env var)
    #[arg(long, env = "MPS_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service and per-predictor health
    Health,

    /// Show details of the loaded models
    Models,

    /// Predict a single record
    #[command(subcommand)]
    Predict(PredictCommands),

    /// Predict every <name>_samples list in a JSON file
    Batch {
        /// Path to the batch request file
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PredictCommands {
    /// Classify wine quality
    Wine(WineArgs),

    /// Assign a customer segment
    Customer(CustomerArgs),

    /// Estimate a house price
    House(HouseArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
        Commands::Models => {
            status::show_models(&client, cli.format).await?;
        }
        Commands::Predict(predict_cmd) => {
            let (predictor, record) = match predict_cmd {
                PredictCommands::Wine(args) => ("wine", args.record()?),
                PredictCommands::Customer(args) => ("customer", args.record()?),
                PredictCommands::House(args) => ("house", args.record()?),
            };
            predict::predict(&client, predictor, record, cli.format).await?;
        }
        Commands::Batch { file } => {
            predict::batch(&client, &file, cli.format).await?;
        }
    }

    Ok(())
}
