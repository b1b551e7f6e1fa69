use reqwest::Client;

/// Print the configured toolsets.
pub async fn list_toolsets(url: &str) -> anyhow::Result<()> {
    let resp = Client::new().get(format!("{url}/toolsets")).send().await?;

    if !resp.status().is_success() {
        let body = resp.text().await?;
        anyhow::bail!("Failed to list toolsets: {body}");
    }

    let result: serde_json::Value = resp.json().await?;
    println!("{}", serde_json::to_string_pretty(&result["toolsets"])?);

    Ok(())
}

/// Fetch a toolset's tools and print them.
pub async fn get_tools(url: &str, toolset: &str, agent_name: Option<&str>) -> anyhow::Result<()> {
    let body = match agent_name {
        Some(name) => serde_json::json!({ "context": { "agent_name": name } }),
        None => serde_json::json!({}),
    };

    let resp = Client::new()
        .post(format!("{url}/toolsets/{toolset}/tools"))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await?;
        anyhow::bail!("Failed to get tools of '{toolset}' ({status}): {body}");
    }

    let result: serde_json::Value = resp.json().await?;
    let tools = result["tools"].as_array().map_or(0, Vec::len);
    tracing::info!("Toolset '{toolset}' has {tools} tool(s)");
    println!("{}", serde_json::to_string_pretty(&result["tools"])?);

    Ok(())
}
