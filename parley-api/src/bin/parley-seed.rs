//! Parley test-data generator.
//!
//! Seeds an in-memory deployment through the messaging service and exports
//! the written rows as JSON, alongside the CQL schema they belong to.
//!
//! ```text
//! parley-seed [--out DIR] [--seed N] [--users N] [--conversations N]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parley_api::{
    seed,
    telemetry::{init_tracing, LogFormat},
    ApiConfig, ApiError, ApiResult, MessagingService, SeedConfig,
};
use parley_core::MessageIdGenerator;
use parley_storage::{schema, InMemoryStore};
use rand::{rngs::StdRng, SeedableRng};

struct Args {
    out: PathBuf,
    seed: Option<u64>,
    config: SeedConfig,
}

fn parse_args() -> ApiResult<Args> {
    let mut parsed = Args {
        out: PathBuf::from("testdata"),
        seed: None,
        config: SeedConfig::default(),
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let value = args
            .next()
            .ok_or_else(|| ApiError::invalid_input(format!("{} requires a value", arg)))?;
        match arg.as_str() {
            "--out" => parsed.out = PathBuf::from(value),
            "--seed" => parsed.seed = Some(parse_number(&arg, &value)?),
            "--users" => parsed.config.users = parse_number(&arg, &value)?,
            "--conversations" => parsed.config.conversations = parse_number(&arg, &value)?,
            other => {
                return Err(ApiError::invalid_input(format!("Unknown argument: {}", other)));
            }
        }
    }
    Ok(parsed)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> ApiResult<T> {
    value
        .parse()
        .map_err(|_| ApiError::invalid_input(format!("Invalid value for {}: {}", flag, value)))
}

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(LogFormat::from_env())?;

    let args = parse_args()?;
    let api_config = ApiConfig::from_env()?;

    let store = Arc::new(InMemoryStore::new());
    let ids = Arc::new(MessageIdGenerator::system());
    let service = MessagingService::new(store, ids, api_config.parley.clone())?;

    let seed_value = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed_value);
    tracing::info!(seed = seed_value, out = %args.out.display(), "Generating test data");

    let report = seed(&service, &args.config, &mut rng, Utc::now()).await?;

    report.export(&args.out).map_err(|e| {
        ApiError::internal_error(format!("Failed to export to {}: {}", args.out.display(), e))
    })?;
    let schema_path = args.out.join("schema.cql");
    std::fs::write(&schema_path, schema::render(&api_config.parley)).map_err(|e| {
        ApiError::internal_error(format!("Failed to write {}: {}", schema_path.display(), e))
    })?;

    tracing::info!(
        users = report.users.len(),
        conversations = report.conversation_keys().len(),
        messages = report.messages.len(),
        "Test data written"
    );
    Ok(())
}
