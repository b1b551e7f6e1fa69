use std::path::Path;

use anyhow::Context;
use reqwest::Client;

use toolbridge_core::{TrimBudget, Turn};

/// Send a history file through the server's trimmer and print what remains.
pub async fn run(url: &str, file: &Path, budget: Option<TrimBudget>) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let contents: Vec<Turn> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of turns", file.display()))?;

    let mut body = serde_json::json!({ "contents": contents });
    if let Some(budget) = budget {
        body["max_previous_user_turns"] = i64::from(budget).into();
    }

    let resp = Client::new()
        .post(format!("{url}/history/trim"))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let body = resp.text().await?;
        anyhow::bail!("Failed to trim history: {body}");
    }

    let result: serde_json::Value = resp.json().await?;
    if result["trimmed"].as_bool().unwrap_or(false) {
        let kept = result["contents"].as_array().map_or(0, Vec::len);
        tracing::info!("Trimmed history to {kept} turn(s)");
    }
    println!("{}", serde_json::to_string_pretty(&result["contents"])?);

    Ok(())
}
