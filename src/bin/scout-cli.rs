use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "scout-cli")]
#[command(about = "Operations CLI for a running scout-resilience instance", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every health check and print the report
    Health {
        /// Print the cached summary instead of running checks
        #[arg(long)]
        summary: bool,
    },
    /// Liveness probe
    Ping,
    /// Request, security, cache and rate limiter metrics
    Metrics,
    /// Clear cached entries, optionally only those matching a glob pattern
    ClearCache {
        pattern: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Health { summary: false } => client.get(format!("{}/health", cli.url)).send().await?,
        Commands::Health { summary: true } => {
            client.get(format!("{}/health/summary", cli.url)).send().await?
        }
        Commands::Ping => client.get(format!("{}/ping", cli.url)).send().await?,
        Commands::Metrics => client.get(format!("{}/metrics", cli.url)).send().await?,
        Commands::ClearCache { pattern } => {
            client
                .post(format!("{}/cache/clear", cli.url))
                .json(&json!({ "pattern": pattern }))
                .send()
                .await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
