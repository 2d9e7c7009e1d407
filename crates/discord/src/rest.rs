use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dividy_core::config::DiscordConfig;

use crate::{commands::CommandDescriptor, components::ReplyMessage};

#[derive(Debug, Error)]
pub enum RestError {
    #[error("discord request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("discord api returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionCallbackType {
    ChannelMessageWithSource = 4,
}

impl Serialize for InteractionCallbackType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

/// Body posted to the interaction callback endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: InteractionCallbackType,
    pub data: ReplyMessage,
}

impl InteractionResponse {
    pub fn channel_message(message: ReplyMessage) -> Self {
        Self { kind: InteractionCallbackType::ChannelMessageWithSource, data: message }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RegisteredCommand {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GatewayInfo {
    pub url: String,
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
    pub max_concurrency: u32,
}

/// Submits interaction replies. The gateway handlers depend on this seam so
/// tests can record submissions instead of hitting the network.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), RestError>;
}

pub struct DiscordRestClient {
    client: Client,
    base_url: String,
    authorization: SecretString,
}

impl DiscordRestClient {
    pub fn new(base_url: impl Into<String>, bot_token: &SecretString) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            authorization: SecretString::from(format!("Bot {}", bot_token.expose_secret())),
        }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(config.api_base_url.clone(), &config.bot_token)
    }

    /// Bulk overwrite of the application's global slash commands.
    pub async fn put_application_commands(
        &self,
        application_id: &str,
        commands: &[CommandDescriptor],
    ) -> Result<Vec<RegisteredCommand>, RestError> {
        let url = format!("{}/applications/{application_id}/commands", self.base_url);
        let response = self
            .client
            .put(&url)
            .header("Authorization", self.authorization.expose_secret())
            .json(commands)
            .send()
            .await?;
        let response = check_status(response).await?;
        let registered: Vec<RegisteredCommand> = response.json().await?;
        Ok(registered)
    }

    pub async fn fetch_gateway_info(&self) -> Result<GatewayInfo, RestError> {
        let url = format!("{}/gateway/bot", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.authorization.expose_secret())
            .send()
            .await?;
        let response = check_status(response).await?;
        let info: GatewayInfo = response.json().await?;
        Ok(info)
    }

    // Callbacks authenticate through the interaction token in the path, not
    // the bot token header.
    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), RestError> {
        let url = format!(
            "{}/interactions/{interaction_id}/{interaction_token}/callback",
            self.base_url
        );
        let http_response = self.client.post(&url).json(response).send().await?;
        check_status(http_response).await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionResponder for DiscordRestClient {
    async fn respond(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response: &InteractionResponse,
    ) -> Result<(), RestError> {
        self.create_interaction_response(interaction_id, interaction_token, response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RestError::Api { status: status.as_u16(), body })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post, put},
        Json, Router,
    };
    use secrecy::SecretString;
    use serde_json::json;

    use super::{DiscordRestClient, InteractionResponder, InteractionResponse, RestError};
    use crate::{commands::default_registry, components::separator_showcase_message};

    #[derive(Default)]
    struct Recorded {
        authorization: Option<String>,
        path: Option<String>,
        body: Option<serde_json::Value>,
    }

    type SharedRecorded = Arc<Mutex<Recorded>>;

    fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
        headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn test_client(base_url: String) -> DiscordRestClient {
        DiscordRestClient::new(base_url, &SecretString::from("MTA5.test.token".to_owned()))
    }

    #[test]
    fn interaction_response_serializes_callback_envelope() {
        let response = InteractionResponse::channel_message(separator_showcase_message());
        let value = serde_json::to_value(response).expect("serialize");

        assert_eq!(value["type"], json!(4));
        assert_eq!(value["data"]["flags"], json!(32_768));
        assert_eq!(value["data"]["components"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn put_application_commands_sends_authorized_bulk_overwrite() {
        let recorded: SharedRecorded = Arc::default();
        let app = Router::new()
            .route(
                "/applications/{application_id}/commands",
                put(
                    |State(state): State<SharedRecorded>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        let registered: Vec<serde_json::Value> = body
                            .as_array()
                            .cloned()
                            .unwrap_or_default()
                            .into_iter()
                            .enumerate()
                            .map(|(index, mut command)| {
                                command["id"] = json!(format!("90000{index}"));
                                command
                            })
                            .collect();

                        let mut slot = state.lock().expect("lock");
                        slot.authorization = header_value(&headers, "authorization");
                        slot.body = Some(body);

                        Json(serde_json::Value::Array(registered))
                    },
                ),
            )
            .with_state(recorded.clone());

        let client = test_client(spawn_server(app).await);
        let registered = client
            .put_application_commands("123456789012345678", &default_registry().descriptors())
            .await
            .expect("register commands");

        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, "900000");
        assert_eq!(registered[0].name, "separator");

        let recorded = recorded.lock().expect("lock");
        assert_eq!(recorded.authorization.as_deref(), Some("Bot MTA5.test.token"));
        assert_eq!(
            recorded.body,
            Some(json!([{
                "name": "separator",
                "description": "Shows supported V2 component separators.",
                "type": 1,
            }]))
        );
    }

    #[tokio::test]
    async fn interaction_callback_posts_to_token_path_without_bot_auth() {
        let recorded: SharedRecorded = Arc::default();
        let app = Router::new()
            .route(
                "/interactions/{interaction_id}/{interaction_token}/callback",
                post(
                    |State(state): State<SharedRecorded>,
                     Path((interaction_id, interaction_token)): Path<(String, String)>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        let mut slot = state.lock().expect("lock");
                        slot.authorization = header_value(&headers, "authorization");
                        slot.path = Some(format!("{interaction_id}/{interaction_token}"));
                        slot.body = Some(body);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(recorded.clone());

        let client = test_client(spawn_server(app).await);
        let response = InteractionResponse::channel_message(separator_showcase_message());
        client.respond("1303999", "aW50ZXJhY3Rpb24", &response).await.expect("respond");

        let recorded = recorded.lock().expect("lock");
        assert_eq!(recorded.authorization, None);
        assert_eq!(recorded.path.as_deref(), Some("1303999/aW50ZXJhY3Rpb24"));
        let body = recorded.body.clone().expect("callback body");
        assert_eq!(body["type"], json!(4));
        assert_eq!(body["data"]["flags"], json!(32_768));
        assert_eq!(body["data"]["components"][0]["accent_color"], json!(5_793_266));
    }

    #[tokio::test]
    async fn api_failure_surfaces_status_and_body() {
        let app = Router::new().route(
            "/interactions/{interaction_id}/{interaction_token}/callback",
            post(|| async {
                (StatusCode::FORBIDDEN, Json(json!({"message": "Missing Access", "code": 50001})))
            }),
        );

        let client = test_client(spawn_server(app).await);
        let response = InteractionResponse::channel_message(separator_showcase_message());
        let error = client
            .respond("1303999", "aW50ZXJhY3Rpb24", &response)
            .await
            .expect_err("forbidden response should fail");

        let RestError::Api { status, body } = error else {
            panic!("unexpected error variant");
        };
        assert_eq!(status, 403);
        assert!(body.contains("Missing Access"));
    }

    #[tokio::test]
    async fn fetch_gateway_info_decodes_session_limits() {
        let recorded: SharedRecorded = Arc::default();
        let app = Router::new()
            .route(
                "/gateway/bot",
                get(|State(state): State<SharedRecorded>, headers: HeaderMap| async move {
                    state.lock().expect("lock").authorization =
                        header_value(&headers, "authorization");
                    Json(json!({
                        "url": "wss://gateway.discord.gg",
                        "shards": 1,
                        "session_start_limit": {
                            "total": 1000,
                            "remaining": 997,
                            "reset_after": 14_400_000u64,
                            "max_concurrency": 1,
                        },
                    }))
                }),
            )
            .with_state(recorded.clone());

        let client = test_client(spawn_server(app).await);
        let info = client.fetch_gateway_info().await.expect("gateway info");

        assert_eq!(info.url, "wss://gateway.discord.gg");
        assert_eq!(info.shards, 1);
        assert_eq!(info.session_start_limit.remaining, 997);
        assert_eq!(info.session_start_limit.max_concurrency, 1);
        assert_eq!(
            recorded.lock().expect("lock").authorization.as_deref(),
            Some("Bot MTA5.test.token")
        );
    }
}
