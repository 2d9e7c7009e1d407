use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    components::separator_showcase_message,
    events::Interaction,
    rest::{InteractionResponder, InteractionResponse, RestError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    ChatInput = 1,
}

impl Serialize for CommandKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

/// Application command definition pushed to Discord during registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub kind: CommandKind,
}

impl CommandDescriptor {
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CommandKind::ChatInput,
        }
    }
}

impl Serialize for CommandDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CommandDescriptor", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("type", &self.kind)?;
        state.end()
    }
}

/// The `data` object carried by an application command interaction.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CommandInvocation {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Responded,
    Ignored,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Respond(#[from] RestError),
}

#[async_trait]
pub trait SlashCommand: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    async fn run(
        &self,
        interaction: &Interaction,
        responder: &dyn InteractionResponder,
    ) -> Result<(), CommandError>;
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn SlashCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, command: C)
    where
        C: SlashCommand + 'static,
    {
        self.commands.insert(command.descriptor().name, Arc::new(command));
    }

    /// Descriptors in name order, the payload shape bulk registration expects.
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        let mut descriptors: Vec<_> =
            self.commands.values().map(|command| command.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub async fn dispatch(
        &self,
        interaction: &Interaction,
        responder: &dyn InteractionResponder,
    ) -> Result<DispatchOutcome, CommandError> {
        let Some(invocation) = &interaction.command else {
            return Ok(DispatchOutcome::Ignored);
        };
        let Some(command) = self.commands.get(&invocation.name) else {
            return Ok(DispatchOutcome::Ignored);
        };

        command.run(interaction, responder).await?;
        Ok(DispatchOutcome::Responded)
    }
}

pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(SeparatorCommand);
    registry
}

/// `/separator`: replies with the components V2 separator showcase.
pub struct SeparatorCommand;

#[async_trait]
impl SlashCommand for SeparatorCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::chat_input("separator", "Shows supported V2 component separators.")
    }

    async fn run(
        &self,
        interaction: &Interaction,
        responder: &dyn InteractionResponder,
    ) -> Result<(), CommandError> {
        let response = InteractionResponse::channel_message(separator_showcase_message());
        responder.respond(&interaction.id, &interaction.token, &response).await?;
        Ok(())
    }
}
