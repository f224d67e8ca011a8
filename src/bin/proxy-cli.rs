use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Inspect a running Veez.ai proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    /// Bearer credential to send instead of the proxy's own token
    #[arg(short, long, env = "VEEZ_CLI_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the proxy's liveness report
    Status,
    /// Alias of status, served from /health
    Health,
    /// Fetch an API path through the proxy, e.g. `get product/abc123`
    Get { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let path = match &cli.command {
        Commands::Status => "/test".to_string(),
        Commands::Health => "/health".to_string(),
        Commands::Get { path } if path.starts_with("/api") => path.clone(),
        Commands::Get { path } => format!("/api/{}", path.trim_start_matches('/')),
    };

    let res = client
        .get(format!("{}{}", base, path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("request failed with status {}", status).into())
    }
}
