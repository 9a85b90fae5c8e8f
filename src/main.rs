use radiola::env::Config;
use radiola::log::initialize_logger;
use radiola::run;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    initialize_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!("on loading the configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = run(config).await {
        error!("on creating the Discord client: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
