//! `dlq add`: queue one or more URLs.

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use crate::cli::AddArgs;
use crate::client::ApiClient;

pub(crate) async fn run(client: &ApiClient, args: AddArgs) -> Result<()> {
    let mut urls = args.urls.clone();
    if let Some(path) = &args.file {
        let file = std::fs::File::open(path).with_context(|| format!("opening {path}"))?;
        urls.extend(read_urls(std::io::BufReader::new(file))?);
    }
    if args.stdin {
        let stdin = std::io::stdin();
        urls.extend(read_urls(stdin.lock())?);
    }
    if urls.is_empty() {
        bail!("no urls given; pass them as arguments, --file, or --stdin");
    }
    if args.name.is_some() && urls.len() > 1 {
        bail!("--name is only valid with a single url");
    }

    let mut failures = 0usize;
    for url in &urls {
        let mut body = json!({
            "url": url,
            "out_dir": args.out,
        });
        set_optional(&mut body, "name", args.name.as_deref());
        set_optional(&mut body, "site", args.site.as_deref());
        set_optional(&mut body, "archive_password", args.archive_password.as_deref());
        if let Some(max_attempts) = args.max_attempts {
            body["max_attempts"] = json!(max_attempts);
        }
        match client.post_json::<Value>("/jobs", &body).await {
            Ok(response) => {
                let id = response["id"].as_i64().unwrap_or_default();
                println!("added job {id}: {url}");
            }
            Err(err) => {
                eprintln!("failed to add {url}: {err:#}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} url(s) failed", urls.len());
    }
    Ok(())
}

fn set_optional(body: &mut Value, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        body[key] = json!(value);
    }
}

/// One URL per line; blank lines and `#` comments are skipped.
fn read_urls(reader: impl BufRead) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line.context("reading url list")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_lists_skip_comments_and_blanks() {
        let input = "https://a.example/1\n\n# comment\n  https://a.example/2  \n";
        let urls = read_urls(input.as_bytes()).expect("urls");
        assert_eq!(urls, vec!["https://a.example/1", "https://a.example/2"]);
    }
}
