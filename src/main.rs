use clap::Parser;
use dqt_doctor::{config::ReproOpts, repro};

async fn inner_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opts = ReproOpts::parse();
    repro::run(&opts).await
}

#[tokio::main]
async fn main() {
    if let Err(e) = inner_main().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
