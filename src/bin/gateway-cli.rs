use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the pipeline gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token for gated deployments.
    #[arg(short, long, env = "PROXY_AUTH_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the gateway is up
    Health,
    /// Show gateway version, protocol and region
    Version,
    /// Run SQL statements as one pipeline batch
    Exec {
        /// Statements, executed in order
        #[arg(required = true)]
        sql: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            let status = res.status();
            println!("{}", status);
            if !status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            let res = client.get(format!("{}/version", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Exec { sql } => {
            let res = client
                .post(format!("{}/v2/pipeline", cli.url))
                .headers(headers)
                .json(&pipeline_body(&sql))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn pipeline_body(statements: &[String]) -> Value {
    let mut requests: Vec<Value> = statements
        .iter()
        .map(|sql| json!({"type": "execute", "stmt": {"sql": sql}}))
        .collect();
    requests.push(json!({"type": "close"}));
    json!({ "requests": requests })
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .and_then(|json| serde_json::to_string_pretty(&json))
        .unwrap_or(text);

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("{}", pretty);
        std::process::exit(1);
    }

    println!("{}", pretty);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ends_with_close() {
        let body = pipeline_body(&["SELECT 1".to_string(), "SELECT 2".to_string()]);
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1]["stmt"]["sql"], "SELECT 2");
        assert_eq!(requests[2]["type"], "close");
    }
}
