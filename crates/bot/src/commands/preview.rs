use dividy_discord::components::separator_showcase_message;
use dividy_discord::rest::InteractionResponse;

/// Prints the exact callback payload `/separator` submits, so operators can
/// inspect the wire shape without a bot token or a network path.
pub fn run() -> String {
    let response = InteractionResponse::channel_message(separator_showcase_message());
    serde_json::to_string_pretty(&response)
        .unwrap_or_else(|error| format!("preview serialization failed: {error}"))
}
