use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "xfunder-cli")]
#[command(about = "Operator CLI for a running xfunder service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// List campaigns
    Campaigns {
        /// active, funded or failed
        #[arg(long)]
        status: Option<String>,
        /// timed or open
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one campaign with its contributions
    Campaign { id: String },
    /// Show a user's wallet and balance
    Wallet { user_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)),
        Commands::Campaigns {
            status,
            kind,
            limit,
        } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(status) = status {
                query.push(("status", status));
            }
            if let Some(kind) = kind {
                query.push(("kind", kind));
            }
            if let Some(limit) = limit {
                query.push(("limit", limit.to_string()));
            }
            client.get(format!("{}/api/campaigns", base)).query(&query)
        }
        Commands::Campaign { id } => client.get(format!("{}/api/campaign/{}", base, id)),
        Commands::Wallet { user_id } => client.get(format!("{}/api/wallet/{}", base, user_id)),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
