//! Prediction commands

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value};
use std::path::Path;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_confidence, format_value, print_error, print_json, print_rows, print_success,
    print_warning, OutputFormat,
};

/// Wine quality features
#[derive(Args, Debug, Default)]
pub struct WineArgs {
    #[arg(long)]
    pub fixed_acidity: Option<f64>,
    #[arg(long)]
    pub volatile_acidity: Option<f64>,
    #[arg(long)]
    pub citric_acid: Option<f64>,
    #[arg(long)]
    pub chlorides: Option<f64>,
    #[arg(long)]
    pub total_sulfur_dioxide: Option<f64>,
    #[arg(long)]
    pub density: Option<f64>,
    #[arg(long)]
    pub sulphates: Option<f64>,
    #[arg(long)]
    pub alcohol: Option<f64>,
    /// Raw JSON record, overrides the feature flags
    #[arg(long)]
    pub json: Option<String>,
}

/// Customer segmentation features
#[derive(Args, Debug, Default)]
pub struct CustomerArgs {
    /// Annual income in k$
    #[arg(long)]
    pub annual_income: Option<f64>,
    /// Spending score (1-100)
    #[arg(long)]
    pub spending_score: Option<f64>,
    /// Raw JSON record, overrides the feature flags
    #[arg(long)]
    pub json: Option<String>,
}

/// House price features
#[derive(Args, Debug, Default)]
pub struct HouseArgs {
    #[arg(long)]
    pub area: Option<f64>,
    #[arg(long)]
    pub room: Option<f64>,
    /// Raw JSON record, overrides the feature flags
    #[arg(long)]
    pub json: Option<String>,
}

impl WineArgs {
    pub fn record(&self) -> Result<Map<String, Value>> {
        build_record(
            self.json.as_deref(),
            &[
                ("fixed_acidity", self.fixed_acidity),
                ("volatile_acidity", self.volatile_acidity),
                ("citric_acid", self.citric_acid),
                ("chlorides", self.chlorides),
                ("total_sulfur_dioxide", self.total_sulfur_dioxide),
                ("density", self.density),
                ("sulphates", self.sulphates),
                ("alcohol", self.alcohol),
            ],
        )
    }
}

impl CustomerArgs {
    pub fn record(&self) -> Result<Map<String, Value>> {
        build_record(
            self.json.as_deref(),
            &[
                ("annual_income", self.annual_income),
                ("spending_score", self.spending_score),
            ],
        )
    }
}

impl HouseArgs {
    pub fn record(&self) -> Result<Map<String, Value>> {
        build_record(self.json.as_deref(), &[("Area", self.area), ("Room", self.room)])
    }
}

/// Record from `--json`, or from the flags that were given
///
/// Absent flags are left out so the server reports them as missing.
fn build_record(json: Option<&str>, fields: &[(&str, Option<f64>)]) -> Result<Map<String, Value>> {
    if let Some(raw) = json {
        return match serde_json::from_str(raw).context("Invalid --json record")? {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("--json must be a JSON object"),
        };
    }

    Ok(fields
        .iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), Value::from(v))))
        .collect())
}

/// Row for a single prediction table
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Row for a batch result table
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Predictor")]
    predictor: String,
    #[tabled(rename = "Sample")]
    sample: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

/// Headline fields of a prediction, in display order
const SUMMARY_FIELDS: &[&str] = &["model", "quality", "cluster", "cluster_meaning", "prediction"];

/// Predict one record and print the result
pub async fn predict(
    client: &ApiClient,
    predictor: &str,
    record: Map<String, Value>,
    format: OutputFormat,
) -> Result<()> {
    let result = client.predict(predictor, &record).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let mut rows: Vec<FieldRow> = SUMMARY_FIELDS
                .iter()
                .filter_map(|field| {
                    result.get(*field).map(|value| FieldRow {
                        field: field.to_string(),
                        value: format_value(value),
                    })
                })
                .collect();

            if let Some(probabilities) = result.get("probability").and_then(Value::as_object) {
                rows.extend(probabilities.iter().map(|(label, p)| FieldRow {
                    field: format!("P({})", label),
                    value: format_value(p),
                }));
            }
            if let Some(confidence) = result.get("confidence").and_then(Value::as_f64) {
                rows.push(FieldRow {
                    field: "confidence".to_string(),
                    value: color_confidence(confidence),
                });
            }

            print_rows(rows);
        }
    }

    Ok(())
}

/// Post a batch request file and print per-sample results
pub async fn batch(client: &ApiClient, file: &Path, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read batch file {}", file.display()))?;
    let request: Value = serde_json::from_str(&content).context("Batch file is not valid JSON")?;

    let response = client.predict_batch(&request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.is_empty() {
                print_warning("No <name>_samples lists in the batch file");
                return Ok(());
            }

            let mut rows = Vec::new();
            let mut failed = 0;
            for (key, items) in &response {
                let predictor = key.strip_suffix("_predictions").unwrap_or(key);
                for item in items {
                    let sample = item
                        .get("sample_index")
                        .map(format_value)
                        .unwrap_or_else(|| "-".to_string());
                    let (result, confidence) = match item.get("error") {
                        Some(error) => {
                            failed += 1;
                            (format!("error: {}", format_value(error)), "-".to_string())
                        }
                        None => (
                            summarize(item),
                            item.get("confidence")
                                .and_then(Value::as_f64)
                                .map(color_confidence)
                                .unwrap_or_else(|| "-".to_string()),
                        ),
                    };
                    rows.push(BatchRow {
                        predictor: predictor.to_string(),
                        sample,
                        result,
                        confidence,
                    });
                }
            }

            let total = rows.len();
            print_rows(rows);
            if failed == 0 {
                print_success(&format!("{} samples predicted", total));
            } else {
                print_error(&format!("{} of {} samples failed", failed, total));
            }
        }
    }

    Ok(())
}

/// One-line description of a successful prediction
fn summarize(item: &Value) -> String {
    if let Some(quality) = item.get("quality") {
        return format_value(quality);
    }
    if let Some(cluster) = item.get("cluster") {
        let meaning = item
            .get("cluster_meaning")
            .map(format_value)
            .unwrap_or_default();
        return format!("cluster {} {}", format_value(cluster), meaning).trim_end().to_string();
    }
    item.get("prediction")
        .map(format_value)
        .unwrap_or_else(|| "-".to_string())
}
