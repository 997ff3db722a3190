//! `dlq settings`: show or patch daemon settings.

use anyhow::Result;
use serde_json::{Value, json};

use crate::cli::SettingsArgs;
use crate::client::ApiClient;

pub(crate) async fn run(client: &ApiClient, args: SettingsArgs) -> Result<()> {
    let settings: Value = if args.concurrency.is_none()
        && args.max_attempts.is_none()
        && args.auto_decrypt.is_none()
    {
        client.get_json("/api/settings").await?
    } else {
        let mut patch = json!({});
        if let Some(concurrency) = args.concurrency {
            patch["concurrency"] = json!(concurrency);
        }
        if let Some(max_attempts) = args.max_attempts {
            patch["max_attempts"] = json!(max_attempts);
        }
        if let Some(auto_decrypt) = args.auto_decrypt {
            patch["auto_decrypt"] = json!(auto_decrypt);
        }
        client.post_json("/api/settings", &patch).await?
    };
    println!("concurrency:  {}", settings["concurrency"]);
    println!("max_attempts: {}", settings["max_attempts"]);
    println!("auto_decrypt: {}", settings["auto_decrypt"]);
    Ok(())
}
