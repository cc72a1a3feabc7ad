//! CLI client for `scand-daemon`'s bus surface. Mirrors the original
//! `lightmediascannerctl` subcommand set: `status`, `monitor`,
//! `write-lock`, `scan`, `stop`.

use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::collections::HashMap;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "scand-ctl")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:7790")]
    daemon: String,

    #[arg(long, default_value = "scand-ctl")]
    client_id: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the daemon's current status.
    Status,
    /// Follow `/events` until interrupted.
    Monitor,
    /// Acquire the write lock and hold it until Ctrl-C.
    WriteLock,
    /// Request a scan. `CATEGORY:PATH` args are repeatable; with none,
    /// scans all categories with their configured defaults.
    Scan { roots: Vec<String> },
    /// Stop the in-progress scan.
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("scand-ctl: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    match args.command {
        Command::Status => {
            let status: serde_json::Value = client
                .get(format!("{}/status", args.daemon))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Monitor => {
            let response = client.get(format!("{}/events", args.daemon)).send().await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                print!("{}", String::from_utf8_lossy(&chunk));
            }
        }

        Command::WriteLock => {
            let response = client
                .post(format!("{}/write-lock", args.daemon))
                .header("X-Client-Id", &args.client_id)
                .send()
                .await?;
            check_status(response).await?;
            println!("write lock held by {} — press Ctrl-C to release", args.client_id);
            tokio::signal::ctrl_c().await?;
            let _ = client
                .post(format!("{}/release-write-lock", args.daemon))
                .header("X-Client-Id", &args.client_id)
                .send()
                .await;
        }

        Command::Scan { roots } => {
            let mut body: HashMap<String, Vec<String>> = HashMap::new();
            for root in roots {
                if let Some((category, path)) = root.split_once(':') {
                    body.entry(category.to_string()).or_default().push(path.to_string());
                } else {
                    anyhow::bail!("expected CATEGORY:PATH, got {root:?}");
                }
            }
            let response = client.post(format!("{}/scan", args.daemon)).json(&body).send().await?;
            check_status(response).await?;
        }

        Command::Stop => {
            let response = client.post(format!("{}/stop", args.daemon)).send().await?;
            check_status(response).await?;
        }
    }

    Ok(())
}

async fn check_status(response: reqwest::Response) -> anyhow::Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        anyhow::bail!("request failed: {body}")
    }
}
