//! Built-in predictor definitions
//!
//! Feature order matches the column order each model was trained on.

use crate::predictor::{ClusterMeanings, FeatureContract, PredictorKind, PredictorSpec};
use serde_json::{json, Value};

pub const WINE: &str = "wine";
pub const CUSTOMER: &str = "customer";
pub const HOUSE: &str = "house";

/// Labels for wine quality classes 0 and 1
pub const QUALITY_LABELS: [&str; 2] = ["Bad (<6)", "Good (≥6)"];

pub const WINE_FEATURES: [&str; 8] = [
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "chlorides",
    "total_sulfur_dioxide",
    "density",
    "sulphates",
    "alcohol",
];

/// Annual income in k$, spending score in 1-100
pub const CUSTOMER_FEATURES: [&str; 2] = ["annual_income", "spending_score"];

pub const HOUSE_FEATURES: [&str; 2] = ["Area", "Room"];

pub const CUSTOMER_SEGMENTS: [(usize, &str); 5] = [
    (0, "Thrifty - Low income, low spending"),
    (1, "Careful - High income, low spending"),
    (2, "Standard - Average income, average spending"),
    (3, "Target - Low income, high spending"),
    (4, "VIP - High income, high spending"),
];

pub fn wine_quality() -> PredictorSpec {
    PredictorSpec {
        name: WINE.to_string(),
        model_name: "wine_quality".to_string(),
        kind: PredictorKind::Classifier,
        contract: FeatureContract::new(WINE_FEATURES),
        class_labels: QUALITY_LABELS.iter().map(|l| l.to_string()).collect(),
        cluster_meanings: ClusterMeanings::default(),
    }
}

pub fn customer_segmentation() -> PredictorSpec {
    PredictorSpec {
        name: CUSTOMER.to_string(),
        model_name: "customer_segmentation".to_string(),
        kind: PredictorKind::Clusterer,
        contract: FeatureContract::new(CUSTOMER_FEATURES),
        class_labels: Vec::new(),
        cluster_meanings: ClusterMeanings::new(CUSTOMER_SEGMENTS),
    }
}

pub fn house_price() -> PredictorSpec {
    PredictorSpec {
        name: HOUSE.to_string(),
        model_name: "house_price".to_string(),
        kind: PredictorKind::Regressor,
        contract: FeatureContract::new(HOUSE_FEATURES),
        class_labels: Vec::new(),
        cluster_meanings: ClusterMeanings::default(),
    }
}

/// All built-in predictors, in the order they are reported
pub fn builtin() -> Vec<PredictorSpec> {
    vec![wine_quality(), customer_segmentation(), house_price()]
}

/// Sample request body for a built-in predictor
pub fn example_payload(name: &str) -> Option<Value> {
    let payload = match name {
        WINE => json!({
            "fixed_acidity": 7.4,
            "volatile_acidity": 0.7,
            "citric_acid": 0.0,
            "chlorides": 0.076,
            "total_sulfur_dioxide": 34.0,
            "density": 0.9978,
            "sulphates": 0.56,
            "alcohol": 9.4
        }),
        CUSTOMER => json!({"annual_income": 50, "spending_score": 60}),
        HOUSE => json!({"Area": 120.0, "Room": 3}),
        _ => return None,
    };
    Some(payload)
}
