use clap::Parser;
use log::{error, info, LevelFilter};
use ncp_capture::configuration::config::Args;
use ncp_capture::controller::controller_handler::Controller;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let controller = match Controller::from_args(&args) {
        Ok(controller) => controller,
        Err(e) => {
            init_logging(LevelFilter::Info);
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };
    init_logging(controller.config.level_filter().unwrap_or(LevelFilter::Info));

    println!("Capture started.");

    match controller.run().await {
        Ok(summary) => {
            info!(
                "Session {} stopped ({:?}) after {} records",
                summary.session_id, summary.stop_reason, summary.total_records
            );
        }
        Err(e) => {
            error!("Error occurred in the capture process: {}, exiting...", e);
            std::process::exit(1);
        }
    }

    println!("Server shutdown");
}

// RUST_LOG, when set, overrides the configured level.
fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}
