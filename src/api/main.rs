use anyhow::Result;
use clap::Parser;

#[path = "../analyst/mod.rs"]
mod analyst;
#[path = "../api/mod.rs"]
mod api;
#[path = "../shared/mod.rs"]
mod shared;

use shared::config::ConfigArgs;

#[derive(Parser)]
#[command(name = "analyst-api")]
#[command(about = "Analyst API - answers uploaded data questions by generating and running scripts")]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config.load()?;

    let _logging = shared::logging::init_service_logging(&config.server.log_dir, "analyst_api");

    api::rest::api::run_rest_server(config).await
}
