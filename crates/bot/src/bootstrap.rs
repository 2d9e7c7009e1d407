use std::sync::Arc;

use dividy_core::config::{AppConfig, ConfigError, LoadOptions};
use dividy_discord::commands::{default_registry, CommandDescriptor};
use dividy_discord::events::command_dispatcher;
use dividy_discord::gateway::{GatewayRunner, ReconnectPolicy, WebSocketGateway};
use dividy_discord::rest::DiscordRestClient;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub rest: Arc<DiscordRestClient>,
    pub descriptors: Vec<CommandDescriptor>,
    pub runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

/// Wires the application from an already-validated config. Nothing here
/// touches the network; the gateway connects when the runner starts.
pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let rest = Arc::new(DiscordRestClient::from_config(&config.discord));
    let descriptors = default_registry().descriptors();
    info!(
        event_name = "system.bootstrap.commands_prepared",
        command_count = descriptors.len(),
        correlation_id = "bootstrap",
        "slash command registry prepared"
    );

    let transport = Arc::new(WebSocketGateway::from_config(&config.gateway, &config.discord));
    let runner = GatewayRunner::new(
        transport,
        command_dispatcher(rest.clone()),
        ReconnectPolicy::from_config(&config.gateway),
    );
    info!(
        event_name = "system.bootstrap.gateway_wired",
        gateway_url = %config.gateway.url,
        correlation_id = "bootstrap",
        "gateway runner wired"
    );

    Application { config, rest, descriptors, runner }
}
