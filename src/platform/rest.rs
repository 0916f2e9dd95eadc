use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, PlatformClient, Sound};

/// The guild endpoint wraps its sounds in `items`; the default-sound
/// endpoint answers with a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SoundList {
    Wrapped { items: Vec<Sound> },
    Bare(Vec<Sound>),
}

impl SoundList {
    fn into_sounds(self) -> Vec<Sound> {
        match self {
            SoundList::Wrapped { items } => items,
            SoundList::Bare(items) => items,
        }
    }
}

/// Cliente REST para la API de Discord
pub struct DiscordRest {
    client: reqwest::Client,
    base_url: String,
}

impl DiscordRest {
    pub fn new(token: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {}", token))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                "DiscordBot (https://github.com/soundboard-chaos, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let endpoint = self.endpoint(path);
        debug!("🌐 GET {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        let body = Self::check_status(&endpoint, response).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { endpoint, source })
    }

    async fn post_json(&self, path: &str, payload: serde_json::Value) -> Result<(), ApiError> {
        let endpoint = self.endpoint(path);
        debug!("🌐 POST {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        Self::check_status(&endpoint, response).await?;
        Ok(())
    }

    async fn check_status(endpoint: &str, response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Request {
            endpoint: endpoint.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl PlatformClient for DiscordRest {
    async fn guild_sounds(&self, guild_id: u64) -> Result<Vec<Sound>, ApiError> {
        let list: SoundList = self
            .get_json(&format!("guilds/{}/soundboard-sounds", guild_id))
            .await?;
        Ok(list.into_sounds())
    }

    async fn default_sounds(&self) -> Result<Vec<Sound>, ApiError> {
        let list: SoundList = self.get_json("soundboard-default-sounds").await?;
        Ok(list.into_sounds())
    }

    async fn send_soundboard_sound(&self, channel_id: u64, sound_id: &str) -> Result<(), ApiError> {
        self.post_json(
            &format!("channels/{}/send-soundboard-sound", channel_id),
            json!({ "sound_id": sound_id }),
        )
        .await
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), ApiError> {
        self.post_json(
            &format!("channels/{}/messages", channel_id),
            json!({ "content": content }),
        )
        .await
    }
}
