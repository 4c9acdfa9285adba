//! Exits non-zero unless the exporter at the given URL answers with a 2xx.
//!
//! Usage: `mcping-healthcheck http://127.0.0.1:9150/health`

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = std::env::args().nth(1) else {
        return Err("`mcping-healthcheck` requires exactly one argument.".into());
    };
    if std::env::args().len() != 2 {
        return Err("`mcping-healthcheck` requires exactly one argument.".into());
    }
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;
    client.get(url).send().await?.error_for_status()?;
    println!("Health check succeeded");
    Ok(())
}
