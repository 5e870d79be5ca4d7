use std::env;
use std::sync::Arc;

use tracing::error;

use relayotron::config::{load_config, print_schema};
use relayotron::startup::run;
use relayotron::utils::init_logging;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging);

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
