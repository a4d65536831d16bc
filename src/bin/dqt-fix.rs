//! Scan all vhosts and repair any whose default_queue_type metadata holds the
//! literal string "undefined". Safe to run repeatedly.

use dqt_doctor::repair;

async fn inner_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let fixed = repair::repair_all().await?;
    tracing::debug!(fixed, "repair scan complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = inner_main().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
