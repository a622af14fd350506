use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "ledger-cli")]
#[command(about = "Admin CLI for the rental ledger confirmation engine", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "RENTAL_LEDGER_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine status
    Status,
    /// Confirm an accepted agreement on the ledger and wait for the outcome
    Confirm {
        agreement_id: String,
        /// User id of the confirming counter-party
        #[arg(long)]
        actor: String,
    },
    /// Read the registry's confirmation flag for an agreement
    Onchain { agreement_id: String },
    /// List transactions still being monitored
    Transactions,
    /// Show one monitored transaction
    Tx { hash: String },
    /// Cancel monitoring of a transaction
    Cancel { hash: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request: RequestBuilder = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Confirm { agreement_id, actor } => client
            .post(format!("{}/admin/agreements/{}/confirm", base, agreement_id))
            .json(&json!({ "actor": actor })),
        Commands::Onchain { agreement_id } => {
            client.get(format!("{}/admin/agreements/{}/onchain", base, agreement_id))
        }
        Commands::Transactions => client.get(format!("{}/admin/transactions", base)),
        Commands::Tx { hash } => client.get(format!("{}/admin/transactions/{}", base, hash)),
        Commands::Cancel { hash } => client.delete(format!("{}/admin/transactions/{}", base, hash)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .map(|json| serde_json::to_string_pretty(&json))
        .unwrap_or(Ok(text))?;

    if status.is_success() {
        println!("{}", body);
    } else {
        eprintln!("Error: Admin API returned status {}", status);
        eprintln!("{}", body);
        std::process::exit(1);
    }
    Ok(())
}
