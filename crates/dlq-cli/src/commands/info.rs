//! `dlq info`: daemon metadata.

use anyhow::Result;
use serde_json::Value;

use crate::client::ApiClient;

pub(crate) async fn run(client: &ApiClient) -> Result<()> {
    let meta: Value = client.get_json("/meta").await?;
    println!("version: {}", meta["version"].as_str().unwrap_or("unknown"));
    println!("out_dir presets:");
    if let Some(presets) = meta["out_dir_presets"].as_array() {
        for preset in presets {
            println!("  {}", preset.as_str().unwrap_or_default());
        }
    }
    Ok(())
}
