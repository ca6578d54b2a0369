use clap::Parser;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use sapsync::{fetch::HttpFetcher, portal, store::MemoryStore, sync::SyncEngine};

/// One-shot grade synchronization against the Sapphire community web portal.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Portal student record id (STUDENT_RID).
    #[arg(long, env = "SAPPHIRE_STUDENT_RID")]
    student: String,

    /// Portal origin override.
    #[arg(long, default_value = portal::BASE)]
    base: String,

    /// Session cookie of an authenticated portal login.
    #[arg(long, env = "SAPPHIRE_COOKIE")]
    cookie: Option<String>,

    /// Print the sync report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    let mut headers = HeaderMap::new();
    if let Some(cookie) = &args.cookie {
        headers.insert(COOKIE, HeaderValue::try_from(cookie.as_str())?);
    }
    let client = reqwest::Client::builder()
        .timeout(portal::REQUEST_TIMEOUT)
        .default_headers(headers)
        .build()?;
    let fetcher = HttpFetcher::with_client(client);
    let store = MemoryStore::new();

    let engine = SyncEngine::new(&fetcher, &store).with_base(&args.base);
    match engine.run(&args.student).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            for subject in store.subjects() {
                tracing::info!(
                    target: "main",
                    "{} ({}, room {})",
                    subject.name,
                    subject.teacher,
                    subject.room,
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(target: "main", "\x1b[31msync failed: {e}\x1b[0m");
            Err(e.into())
        }
    }
}
