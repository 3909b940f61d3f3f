//! Churn champion lifecycle on a local tracking root
//!
//! Trains the configured candidates on synthetic churn data, promotes the best
//! one, starts a prediction server against it and scores a few customers.
//!
//! ```text
//! cargo run --example churn_lifecycle -- [config.json]
//! RUST_LOG=champion_registry=debug cargo run --example churn_lifecycle
//! ```

use std::sync::Arc;

use anyhow::Context;
use champion_registry::experiment::FileRunStore;
use champion_registry::features::{FeatureRecord, FeatureValue};
use champion_registry::registry::{CandidateProducer, ChampionResolver, ChampionSelector};
use champion_registry::serving::{ErrorResponse, PredictRequest, PredictionServer};
use champion_registry::telemetry::init_tracing;
use champion_registry::training::{Dataset, JsonModelLoader};
use champion_registry::RegistryConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LOCATIONS: [&str; 4] = ["Paris", "Lyon", "Marseille", "Lille"];
const COMPANIES: [&str; 5] = ["Acme", "Globex", "Initech", "Hooli", "Umbrella"];

fn customer(rng: &mut StdRng) -> FeatureRecord {
    FeatureRecord::from([
        ("Age".to_string(), FeatureValue::from(rng.gen_range(22.0..65.0))),
        ("Total_Purchase".to_string(), FeatureValue::from(rng.gen_range(100.0..18_000.0))),
        ("Account_Manager".to_string(), FeatureValue::from(f64::from(rng.gen_range(0_u8..2)))),
        ("Years".to_string(), FeatureValue::from(rng.gen_range(1.0..10.0))),
        ("Num_Sites".to_string(), FeatureValue::from(f64::from(rng.gen_range(3_u8..15)))),
        ("Location".to_string(), FeatureValue::from(LOCATIONS[rng.gen_range(0..LOCATIONS.len())])),
        ("Company".to_string(), FeatureValue::from(COMPANIES[rng.gen_range(0..COMPANIES.len())])),
    ])
}

/// Churn risk grows with the number of sites and shrinks with tenure.
fn churned(record: &FeatureRecord, rng: &mut StdRng) -> u8 {
    let value = |name: &str| record[name].as_number().unwrap_or_default();
    let score = 0.45 * value("Num_Sites") + 0.6 * value("Account_Manager") - 0.15 * value("Years")
        - 4.0
        + rng.gen_range(-1.0..1.0);
    u8::from(score > 0.0)
}

fn synthetic_churn(rows: usize, seed: u64) -> anyhow::Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let records: Vec<FeatureRecord> = (0..rows).map(|_| customer(&mut rng)).collect();
    let labels = records.iter().map(|r| churned(r, &mut rng)).collect();
    Ok(Dataset::new(records, labels)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("champion_registry=info");

    let config = match std::env::args().nth(1) {
        Some(path) => RegistryConfig::from_json_file(&path)
            .with_context(|| format!("loading {path}"))?,
        None => RegistryConfig::default(),
    }
    .apply_env_overrides()?;
    config.validate()?;

    let store = Arc::new(
        FileRunStore::open(&config.tracking_root)
            .await
            .context("opening tracking root")?,
    );

    // 1. Train and register candidates.
    let data = synthetic_churn(600, config.seed)?;
    let report = CandidateProducer::from_config(Arc::clone(&store), &config)
        .produce(&config.experiment, &data)
        .await?;
    println!("Registered {} candidate(s):", report.candidates.len());
    for candidate in &report.candidates {
        println!(
            "  {:<20} {}  {} = {:.3}",
            candidate.model_name,
            candidate.run_id,
            config.ranking_metric,
            candidate
                .metrics
                .entries()
                .iter()
                .find(|(name, _)| *name == config.ranking_metric)
                .map_or(f64::NAN, |(_, v)| *v)
        );
    }
    for failure in &report.failures {
        println!("  {:<20} failed: {}", failure.model_name, failure.error);
    }

    // 2. Promote the best candidate.
    let promotion = ChampionSelector::from_config(Arc::clone(&store), &config)
        .select(&config.experiment)
        .await?;
    println!(
        "\nChampion: {} ({} = {:.3}), retired {:?}",
        promotion.run_id, promotion.metric, promotion.value, promotion.retired
    );

    // 3. Serve it.
    let resolver = ChampionResolver::from_config(Arc::clone(&store), Arc::new(JsonModelLoader), &config);
    let server = PredictionServer::start(resolver, config.schema.clone()).await;
    println!("Health: {}", serde_json::to_string(&server.health())?);

    let mut rng = StdRng::seed_from_u64(config.seed + 1);
    let request = PredictRequest::new((0..5).map(|_| customer(&mut rng)).collect());
    match server.predict(&request) {
        Ok(response) => {
            for (label, probability) in response.predictions.iter().zip(&response.probabilities) {
                println!("  churn={label}  p={probability:.3}");
            }
        }
        Err(err) => println!("{}", serde_json::to_string(&ErrorResponse::from(&err))?),
    }

    Ok(())
}
