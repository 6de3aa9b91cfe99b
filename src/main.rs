use isit_metrics::config::Settings;
use isit_metrics::db::Database;
use isit_metrics::messages::{replace_message_variables, resolve_tier};
use isit_metrics::models::MessageVariables;
use isit_metrics::scoring::MetricsEngine;
use log::{error, info, warn};
use std::env;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let user_id = match env::args().nth(1) {
        Some(id) => id,
        None => {
            eprintln!("Usage: isit-report <user_id>");
            process::exit(2);
        }
    };

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let database = match Database::new(&settings).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    let engine = MetricsEngine::new(database.clone(), database.clone(), database.clone());
    let metrics = match engine.user_metrics(&user_id).await {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("Failed to compute metrics for {}: {}", user_id, e);
            process::exit(1);
        }
    };
    info!("Computed metrics for {}", user_id);

    match serde_json::to_string_pretty(&metrics) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize metrics: {}", e),
    }

    // Tier messages are optional, a missing table row just means no message.
    let tiers = database.score_tiers().await.unwrap_or_else(|e| {
        warn!("Failed to load score tiers: {}", e);
        Vec::new()
    });
    if let Some(tier) = resolve_tier(&tiers, metrics.raw_score) {
        let vars = MessageVariables::from(&metrics);
        println!("{}: {}", tier.title, replace_message_variables(&tier.message, &vars));
    }
}
