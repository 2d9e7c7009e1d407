use crate::bootstrap::{bootstrap, BootstrapError};
use crate::commands::CommandResult;
use dividy_core::config::LoadOptions;

pub fn run() -> CommandResult {
    let app = match bootstrap(LoadOptions::default()) {
        Ok(app) => app,
        Err(BootstrapError::Config(error)) => {
            return CommandResult::failure(
                "register",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "register",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        app.rest
            .put_application_commands(&app.config.discord.application_id, &app.descriptors)
            .await
    });

    match result {
        Ok(registered) => {
            let names: Vec<&str> = registered.iter().map(|command| command.name.as_str()).collect();
            CommandResult::success(
                "register",
                format!(
                    "registered {} application command(s): {}",
                    registered.len(),
                    names.join(", ")
                ),
            )
        }
        Err(error) => {
            CommandResult::failure("register", "command_registration", error.to_string(), 4)
        }
    }
}
