use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    commands::{default_registry, CommandError, CommandInvocation, CommandRegistry, DispatchOutcome},
    rest::InteractionResponder,
};

/// One decoded gateway dispatch, paired with the sequence number Discord
/// attached to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub sequence: Option<u64>,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready(ReadyEvent),
    InteractionCreate(Interaction),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::Ready(_) => GatewayEventType::Ready,
            Self::InteractionCreate(_) => GatewayEventType::InteractionCreate,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Ready,
    InteractionCreate,
    Unsupported,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ReadyEvent {
    pub session_id: String,
    pub resume_gateway_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionType {
    Ping,
    ApplicationCommand,
    Other(u8),
}

impl<'de> Deserialize<'de> for InteractionType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Ok(match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            other => Self::Other(other),
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Interaction {
    pub id: String,
    pub application_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub token: String,
    #[serde(rename = "data")]
    pub command: Option<CommandInvocation>,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    /// Interactions correlate by their own id; everything else falls back to
    /// the envelope sequence.
    pub fn for_envelope(envelope: &GatewayEnvelope) -> Self {
        let correlation_id = match &envelope.event {
            GatewayEvent::InteractionCreate(interaction) => interaction.id.clone(),
            _ => match envelope.sequence {
                Some(sequence) => format!("seq-{sequence}"),
                None => "unattributed".to_owned(),
            },
        };
        Self { correlation_id }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unattributed".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded,
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired for slash command traffic: logs session readiness and
/// routes application command interactions through the default registry.
pub fn command_dispatcher(responder: Arc<dyn InteractionResponder>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ReadyLogHandler);
    dispatcher.register(InteractionCreateHandler::new(default_registry(), responder));
    dispatcher
}

pub struct ReadyLogHandler;

#[async_trait]
impl EventHandler for ReadyLogHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Ready
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::Ready(ready) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        tracing::info!(
            event_name = "ingress.discord.ready",
            session_id = %ready.session_id,
            "gateway session established"
        );
        Ok(HandlerResult::Processed)
    }
}

pub struct InteractionCreateHandler {
    registry: CommandRegistry,
    responder: Arc<dyn InteractionResponder>,
}

impl InteractionCreateHandler {
    pub fn new(registry: CommandRegistry, responder: Arc<dyn InteractionResponder>) -> Self {
        Self { registry, responder }
    }
}

#[async_trait]
impl EventHandler for InteractionCreateHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::InteractionCreate
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::InteractionCreate(interaction) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        match interaction.kind {
            InteractionType::ApplicationCommand => {}
            // Pings only reach HTTP interaction endpoints; nothing to answer here.
            InteractionType::Ping => return Ok(HandlerResult::Processed),
            InteractionType::Other(_) => return Ok(HandlerResult::Ignored),
        }

        let outcome = self.registry.dispatch(interaction, self.responder.as_ref()).await?;
        Ok(match outcome {
            DispatchOutcome::Responded => HandlerResult::Responded,
            DispatchOutcome::Ignored => HandlerResult::Ignored,
        })
    }
}
