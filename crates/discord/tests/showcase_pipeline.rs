//! Scripted end-to-end run of the ingress pipeline: gateway envelopes go in,
//! recorded interaction callbacks come out. No sockets, no Discord.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use dividy_discord::commands::CommandInvocation;
use dividy_discord::events::{
    command_dispatcher, GatewayEnvelope, GatewayEvent, Interaction, InteractionType, ReadyEvent,
};
use dividy_discord::gateway::{GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
use dividy_discord::rest::{InteractionResponder, InteractionResponse, RestError};

struct ScriptedTransport {
    envelopes: Mutex<VecDeque<Result<Option<GatewayEnvelope>, TransportError>>>,
}

impl ScriptedTransport {
    fn with_script(envelopes: Vec<Result<Option<GatewayEnvelope>, TransportError>>) -> Self {
        Self { envelopes: Mutex::new(envelopes.into()) }
    }
}

#[async_trait]
impl GatewayTransport for ScriptedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        self.envelopes.lock().await.pop_front().unwrap_or(Ok(None))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct RecordedCallback {
    interaction_id: String,
    interaction_token: String,
    body: Value,
}

#[derive(Default)]
struct RecordingResponder {
    callbacks: StdMutex<Vec<RecordedCallback>>,
}

impl RecordingResponder {
    fn callbacks(&self) -> Vec<RecordedCallback> {
        self.callbacks.lock().expect("callback log should not be poisoned").clone()
    }
}

#[async_trait]
impl InteractionResponder for RecordingResponder {
    async fn respond(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), RestError> {
        let body = serde_json::to_value(response).expect("callback body should serialize");
        self.callbacks
            .lock()
            .expect("callback log should not be poisoned")
            .push(RecordedCallback {
                interaction_id: interaction_id.to_owned(),
                interaction_token: interaction_token.to_owned(),
                body,
            });
        Ok(())
    }
}

fn ready_envelope() -> Result<Option<GatewayEnvelope>, TransportError> {
    Ok(Some(GatewayEnvelope {
        sequence: Some(1),
        event: GatewayEvent::Ready(ReadyEvent {
            session_id: "9cbe7a55".to_owned(),
            resume_gateway_url: Some("wss://gateway-us-east1-d.discord.gg".to_owned()),
        }),
    }))
}

fn separator_invocation(
    sequence: u64,
    interaction_id: &str,
    token: &str,
) -> Result<Option<GatewayEnvelope>, TransportError> {
    Ok(Some(GatewayEnvelope {
        sequence: Some(sequence),
        event: GatewayEvent::InteractionCreate(Interaction {
            id: interaction_id.to_owned(),
            application_id: "1300001".to_owned(),
            kind: InteractionType::ApplicationCommand,
            token: token.to_owned(),
            command: Some(CommandInvocation {
                id: "1300777".to_owned(),
                name: "separator".to_owned(),
            }),
            guild_id: Some("1300123".to_owned()),
            channel_id: Some("1300456".to_owned()),
        }),
    }))
}

fn expected_callback_body() -> Value {
    json!({
        "type": 4,
        "data": {
            "flags": 32_768,
            "components": [
                {
                    "type": 17,
                    "accent_color": 5_793_266,
                    "components": [
                        {"type": 10, "content": "🔹 Small Divider"},
                        {"type": 14, "divider": true, "spacing": 1},
                        {"type": 10, "content": "🔸 Large Divider"},
                        {"type": 14, "divider": true, "spacing": 2},
                        {"type": 10, "content": "⚪ Invisible Spacer"},
                        {"type": 14, "divider": false, "spacing": 1},
                    ],
                },
            ],
        },
    })
}

#[tokio::test]
async fn separator_invocation_produces_one_showcase_callback() {
    let responder = Arc::new(RecordingResponder::default());
    let transport = Arc::new(ScriptedTransport::with_script(vec![
        ready_envelope(),
        separator_invocation(2, "int-1100", "dG9rZW4tMTEwMA"),
    ]));
    let runner = GatewayRunner::new(
        transport,
        command_dispatcher(responder.clone()),
        ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
    );

    runner.start().await.expect("runner should drain the script");

    let callbacks = responder.callbacks();
    assert_eq!(callbacks.len(), 1, "one invocation should produce exactly one callback");
    assert_eq!(callbacks[0].interaction_id, "int-1100");
    assert_eq!(callbacks[0].interaction_token, "dG9rZW4tMTEwMA");
    assert_eq!(callbacks[0].body, expected_callback_body());
}

#[tokio::test]
async fn repeated_invocations_produce_identical_independent_callbacks() {
    let responder = Arc::new(RecordingResponder::default());
    let transport = Arc::new(ScriptedTransport::with_script(vec![
        ready_envelope(),
        separator_invocation(2, "int-2201", "dG9rZW4tMjIwMQ"),
        separator_invocation(3, "int-2202", "dG9rZW4tMjIwMg"),
        separator_invocation(4, "int-2203", "dG9rZW4tMjIwMw"),
    ]));
    let runner = GatewayRunner::new(
        transport,
        command_dispatcher(responder.clone()),
        ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
    );

    runner.start().await.expect("runner should drain the script");

    let callbacks = responder.callbacks();
    assert_eq!(callbacks.len(), 3, "three invocations should produce three callbacks");
    let expected = expected_callback_body();
    for callback in &callbacks {
        assert_eq!(callback.body, expected);
    }
    assert_eq!(callbacks[0].interaction_id, "int-2201");
    assert_eq!(callbacks[1].interaction_id, "int-2202");
    assert_eq!(callbacks[2].interaction_id, "int-2203");
}

#[tokio::test]
async fn pipeline_survives_a_mid_stream_reconnect() {
    let responder = Arc::new(RecordingResponder::default());
    let transport = Arc::new(ScriptedTransport::with_script(vec![
        ready_envelope(),
        separator_invocation(2, "int-3301", "dG9rZW4tMzMwMQ"),
        Err(TransportError::ReconnectRequested),
        ready_envelope(),
        separator_invocation(2, "int-3302", "dG9rZW4tMzMwMg"),
    ]));
    let runner = GatewayRunner::new(
        transport,
        command_dispatcher(responder.clone()),
        ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
    );

    runner.start().await.expect("runner should reconnect and drain the script");

    let callbacks = responder.callbacks();
    assert_eq!(callbacks.len(), 2, "invocations on both sides of the reconnect should respond");
    assert_eq!(callbacks[0].interaction_id, "int-3301");
    assert_eq!(callbacks[1].interaction_id, "int-3302");
    assert_eq!(callbacks[0].body, callbacks[1].body);
}

#[tokio::test]
async fn unknown_commands_pass_through_without_callbacks() {
    let responder = Arc::new(RecordingResponder::default());
    let unknown = Ok(Some(GatewayEnvelope {
        sequence: Some(2),
        event: GatewayEvent::InteractionCreate(Interaction {
            id: "int-4401".to_owned(),
            application_id: "1300001".to_owned(),
            kind: InteractionType::ApplicationCommand,
            token: "dG9rZW4tNDQwMQ".to_owned(),
            command: Some(CommandInvocation {
                id: "1300778".to_owned(),
                name: "poll".to_owned(),
            }),
            guild_id: None,
            channel_id: None,
        }),
    }));
    let transport = Arc::new(ScriptedTransport::with_script(vec![
        ready_envelope(),
        unknown,
        separator_invocation(3, "int-4402", "dG9rZW4tNDQwMg"),
    ]));
    let runner = GatewayRunner::new(
        transport,
        command_dispatcher(responder.clone()),
        ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
    );

    runner.start().await.expect("runner should drain the script");

    let callbacks = responder.callbacks();
    assert_eq!(callbacks.len(), 1, "only the registered command should respond");
    assert_eq!(callbacks[0].interaction_id, "int-4402");
}
