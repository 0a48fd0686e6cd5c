//! Period download example
//!
//! Authenticates against the portal, retrieves every received invoice for a date
//! range and saves the XML documents:
//!
//! ```bash
//! SAT_RFC=XAXX010101000 SAT_CIEC=secret \
//!     cargo run --example download_period -- 2024-01-01 2024-01-31
//! ```

use cfdi_dl::{
    BulkFetcher, Config, Credentials, DirectorySink, OverflowEvent, RetrievalEngine,
    SessionClient,
};
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cfdi_dl=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let start: NaiveDate = args.next().ok_or("missing start date")?.parse()?;
    let end: NaiveDate = match args.next() {
        Some(end) => end.parse()?,
        None => start,
    };

    let credentials = Credentials::new(std::env::var("SAT_RFC")?, std::env::var("SAT_CIEC")?);
    let config = Config::default();

    let mut session = SessionClient::new(&config)?;
    session.authenticate(&credentials).await?;
    let client = session.http_client().clone();

    let mut engine = RetrievalEngine::new(session, &config);
    let on_overflow = |event: &OverflowEvent| {
        println!("⚠ {} reported {} rows, results may be incomplete", event.window, event.count);
    };
    let summary = engine.download_period(start, end, Some(&on_overflow)).await?;
    println!(
        "✓ {} records over {} days ({} queries, {} overflows)",
        summary.records, summary.days, summary.queries, summary.overflows
    );

    let mut sink = DirectorySink::from_config(&config.fetch).await?;
    let report = BulkFetcher::from_config(client, &config.fetch)
        .fetch_into(engine.urls(), &mut sink)
        .await;
    println!(
        "✓ {} documents saved to {}, {} failed",
        sink.written().len(),
        sink.dir().display(),
        report.failed.len()
    );
    for (url, reason) in &report.failed {
        println!("✗ {url}: {reason}");
    }

    Ok(())
}
