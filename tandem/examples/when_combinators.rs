//! Runs `when_all` and `when_any` over two timers of 3 and 8 seconds,
//! once with unit timers and once with timers producing a value.
//!
//! ```text
//! RUST_LOG=debug cargo run --example when_combinators
//! ```

use std::time::{Duration, Instant};

use tandem::time::{execute_with_timeout, sleep};
use tracing::info;

async fn unit_timer(duration: Duration) -> tandem::Result<()> {
    sleep(duration).await;
    Ok(())
}

async fn bool_timer(duration: Duration) -> tandem::Result<bool> {
    sleep(duration).await;
    Ok(true)
}

const SHORT: Duration = Duration::from_secs(3);
const LONG: Duration = Duration::from_secs(8);

#[tandem::main]
async fn main() -> tandem::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let start = Instant::now();
    tandem::when_all!(unit_timer(SHORT), unit_timer(LONG)).await?;
    info!(elapsed = ?start.elapsed(), "when_all over unit timers");

    let start = Instant::now();
    let (first, second) = tandem::when_all!(bool_timer(SHORT), bool_timer(LONG)).await?;
    info!(elapsed = ?start.elapsed(), first, second, "when_all over bool timers");

    let start = Instant::now();
    let ((), index) = tandem::when_any!(unit_timer(SHORT), unit_timer(LONG)).await?;
    info!(elapsed = ?start.elapsed(), index, "when_any over unit timers");

    let start = Instant::now();
    let (value, index) = tandem::when_any!(bool_timer(SHORT), bool_timer(LONG)).await?;
    info!(elapsed = ?start.elapsed(), value, index, "when_any over bool timers");

    let start = Instant::now();
    let outcome = execute_with_timeout(bool_timer(LONG), SHORT).await;
    info!(elapsed = ?start.elapsed(), cancelled = outcome.is_err(), "timed-out bool timer");

    Ok(())
}
