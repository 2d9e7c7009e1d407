use crate::bootstrap::{bootstrap_with_config, Application};
use crate::commands::CommandResult;
use crate::init_logging;
use dividy_core::config::{AppConfig, LoadOptions};
use tracing::info;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    // Logging comes up before any wiring so bootstrap events are visible.
    init_logging(&config);
    let app = bootstrap_with_config(config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(serve(app)) {
        Ok(message) => CommandResult::success("run", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("run", error_class, message, exit_code)
        }
    }
}

async fn serve(app: Application) -> Result<String, (&'static str, String, u8)> {
    let registered = app
        .rest
        .put_application_commands(&app.config.discord.application_id, &app.descriptors)
        .await
        .map_err(|error| ("command_registration", error.to_string(), 4u8))?;
    info!(
        event_name = "system.run.commands_registered",
        command_count = registered.len(),
        correlation_id = "bootstrap",
        "slash commands registered"
    );

    tokio::select! {
        result = app.runner.start() => match result {
            Ok(()) => Ok("gateway stopped after exhausting reconnect attempts".to_string()),
            Err(error) => Err(("gateway", error.to_string(), 5u8)),
        },
        shutdown = tokio::signal::ctrl_c() => match shutdown {
            Ok(()) => {
                info!(
                    event_name = "system.run.stopping",
                    correlation_id = "shutdown",
                    "shutdown signal received"
                );
                Ok("shutdown complete".to_string())
            }
            Err(error) => Err(("signal_handler", error.to_string(), 3u8)),
        },
    }
}
