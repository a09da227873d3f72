use std::collections::BTreeMap;

use clap::Parser;
use url::Url;

#[derive(Parser)]
#[command(name = "counters-cli")]
#[command(about = "Show per-route hit counters of a running interceptor", long_about = None)]
struct Cli {
    /// Base URL of the server
    #[arg(short, long, default_value = "http://localhost:8008")]
    url: String,

    /// Print the raw JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let endpoint = counters_url(&cli.url)?;

    let res = reqwest::get(endpoint.clone()).await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: {} returned status {}", endpoint, status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let counters: BTreeMap<String, u64> = res.json().await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&counters)?);
        return Ok(());
    }

    let mut rows: Vec<_> = counters.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let width = rows.iter().map(|(_, n)| n.to_string().len()).max().unwrap_or(1);
    for (route, hits) in rows {
        println!("{hits:>width$}  {route}");
    }
    Ok(())
}

/// `<base>/__/counters`, keeping any path prefix of `base`.
fn counters_url(base: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}/__/counters"));
    Ok(url)
}
