//! Service status commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, print_json, print_rows, print_success, print_warning, OutputFormat,
};

/// Row for the health table
#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Predictor")]
    predictor: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Row for the models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Predictor")]
    predictor: String,
    #[tabled(rename = "Type")]
    model_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Features")]
    features: String,
    #[tabled(rename = "Outputs")]
    outputs: String,
}

/// Show overall and per-predictor health
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("Service status: {}\n", color_status(&health.status));
            let rows: Vec<HealthRow> = health
                .models
                .iter()
                .map(|(name, loaded)| HealthRow {
                    predictor: name.clone(),
                    status: color_status(if *loaded { "loaded" } else { "unavailable" }),
                })
                .collect();
            print_rows(rows);
        }
    }

    Ok(())
}

/// Show details of every configured predictor
pub async fn show_models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let models = client.models_info().await?;

    match format {
        OutputFormat::Json => print_json(&models)?,
        OutputFormat::Table => {
            if models.is_empty() {
                print_warning("No predictors configured");
                return Ok(());
            }

            let rows: Vec<ModelRow> = models
                .iter()
                .map(|(name, info)| match info {
                    Some(info) => ModelRow {
                        predictor: name.clone(),
                        model_type: info.model_type.clone(),
                        size: info
                            .n_estimators
                            .map(|n| format!("{} trees", n))
                            .or_else(|| info.n_clusters.map(|n| format!("{} clusters", n)))
                            .or_else(|| info.n_coefficients.map(|n| format!("{} coefficients", n)))
                            .unwrap_or_else(|| "-".to_string()),
                        features: info.features.join(", "),
                        outputs: info
                            .classes
                            .as_ref()
                            .map(|c| c.join(", "))
                            .unwrap_or_else(|| "-".to_string()),
                    },
                    None => ModelRow {
                        predictor: name.clone(),
                        model_type: color_status("unavailable"),
                        size: "-".to_string(),
                        features: "-".to_string(),
                        outputs: "-".to_string(),
                    },
                })
                .collect();

            let loaded = models.values().filter(|m| m.is_some()).count();
            print_rows(rows);
            print_success(&format!("{} of {} predictors loaded", loaded, models.len()));
        }
    }

    Ok(())
}
