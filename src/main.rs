//! crawlpace - adaptive per-domain pacing and retry control for crawlers.
//!
//! A request pipeline that slows every dispatch to a misbehaving host,
//! not just the request that hit the error, and speeds back up once the
//! host recovers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first, so RUST_LOG set there reaches the filter below
    let _ = dotenvy::dotenv();

    let default_filter = if crawlpace::cli::is_verbose() {
        "crawlpace=debug"
    } else {
        "crawlpace=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    crawlpace::cli::run().await
}
