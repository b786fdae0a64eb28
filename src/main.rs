use std::time::Instant;

use anyhow::{Context, Result};

use footstats_etl::config::{self, RunConfig};
use footstats_etl::http_client::http_client;
use footstats_etl::pipeline;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::init();

    let config = RunConfig::from_env();
    let db_path = config::parse_db_path_arg()
        .or_else(config::default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut conn = pipeline::open_db(&db_path)?;
    let client = http_client()?;

    let started = Instant::now();
    let summary = pipeline::run(&mut conn, client, &config)
        .with_context(|| format!("pipeline run failed (db: {})", db_path.display()))?;

    if std::env::args().any(|arg| arg == "--json") {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize run summary")?
        );
        return Ok(());
    }

    println!("Player stats pipeline complete");
    println!("DB: {}", db_path.display());
    println!("Raw rows: {}", summary.raw_rows);
    println!("Normalized rows: {}", summary.normalized_rows);
    println!("Clean rows: {}", summary.clean_rows);
    println!("Gold rows: {}", summary.gold_rows);
    println!("Elapsed: {:.1}s", started.elapsed().as_secs_f64());

    Ok(())
}
