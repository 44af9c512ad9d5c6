use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "balancer-cli")]
#[command(about = "Management CLI for the smart balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check balancer status
    Status,
    /// List backends with health, weight and latency
    Backends,
    /// Register a backend
    Register {
        id: String,
        address: String,
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long)]
        security_level: Option<u8>,
    },
    /// Replace a backend's address and tags
    Update {
        id: String,
        address: String,
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long)]
        security_level: Option<u8>,
    },
    /// Remove a backend
    Deregister { id: String },
    /// Show the active algorithm, or switch to NAME
    Algorithm { name: Option<String> },
    /// View routing analytics
    Analytics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)).send().await?,
        Commands::Backends => client.get(format!("{}/admin/backends", base)).send().await?,
        Commands::Register {
            id,
            address,
            specialization,
            security_level,
        } => {
            client
                .post(format!("{}/admin/backends", base))
                .json(&json!({
                    "id": id,
                    "address": address,
                    "specialization": specialization,
                    "security_level": security_level,
                }))
                .send()
                .await?
        }
        Commands::Update {
            id,
            address,
            specialization,
            security_level,
        } => {
            client
                .put(format!("{}/admin/backends/{}", base, id))
                .json(&json!({
                    "address": address,
                    "specialization": specialization,
                    "security_level": security_level,
                }))
                .send()
                .await?
        }
        Commands::Deregister { id } => {
            client
                .delete(format!("{}/admin/backends/{}", base, id))
                .send()
                .await?
        }
        Commands::Algorithm { name: None } => {
            client.get(format!("{}/admin/algorithm", base)).send().await?
        }
        Commands::Algorithm { name: Some(name) } => {
            client
                .put(format!("{}/admin/algorithm", base))
                .json(&json!({ "algorithm": name }))
                .send()
                .await?
        }
        Commands::Analytics => client.get(format!("{}/admin/analytics", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
