use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Default location of the YAML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// Reply to `refresh` when `command_responses` has none.
pub const DEFAULT_REFRESH_RESPONSE: &str = "Refreshed soundboard!";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Discord
    pub bot_token: String,
    pub server_id: u64,
    pub voice_channel_id: u64,
    pub api_base_url: String,
    pub request_timeout_seconds: u64,

    // Voz
    pub self_mute: bool,
    pub self_deaf: bool,

    // Intervalos
    pub min_interval_seconds: u64,
    pub max_interval_seconds: u64,

    // Rapid fire
    pub rapid_fire_probability: f32,
    pub rapid_fire_min_interval_milliseconds: u64,
    pub rapid_fire_max_interval_milliseconds: u64,
    pub rapid_fire_count_min: u32,
    pub rapid_fire_count_max: u32,
    pub overlap_groupings: bool,

    // Sonidos
    #[serde(deserialize_with = "id_list")]
    pub excluded_sounds: Vec<String>,
    pub use_default_sounds: bool,
    pub skip_unavailable_sounds: bool,

    // Comandos de texto
    pub command_prefix: String,
    pub command_responses: HashMap<String, String>,

    // Respuestas de voz (sin implementar)
    pub response_probability: f32,
    pub responses: Vec<String>,
}

impl Config {
    /// Loads the configuration from `CONFIG_PATH` (default `./config.yaml`).
    ///
    /// Sources, lowest priority first:
    ///
    /// 1. The YAML file
    /// 2. `SOUNDBOARD_<FIELD>` environment variables
    /// 3. `DISCORD_TOKEN`, which always wins for `bot_token`
    ///
    /// A `.env` file in the working directory is read before anything else.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Yaml))
            .add_source(
                ::config::Environment::with_prefix("SOUNDBOARD")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("excluded_sounds"),
            )
            .set_override_option("bot_token", std::env::var("DISCORD_TOKEN").ok())?
            .build()
            .with_context(|| format!("Unable to read config file at {}", path))?;

        let config: Self = settings
            .try_deserialize()
            .with_context(|| format!("Unable to parse config file {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token, guild and voice channel must be set
    /// - Every `min`/`max` pair must satisfy `min <= max`
    /// - The base interval must allow a non-zero wait
    /// - Probabilities must be between 0.0 and 1.0
    /// - The command prefix must be non-empty and contain no whitespace
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("bot_token is missing (set it in the config file or DISCORD_TOKEN)");
        }

        if self.server_id == 0 {
            anyhow::bail!("server_id must be set");
        }

        if self.voice_channel_id == 0 {
            anyhow::bail!("voice_channel_id must be set");
        }

        if self.min_interval_seconds > self.max_interval_seconds {
            anyhow::bail!(
                "min_interval_seconds ({}) cannot exceed max_interval_seconds ({})",
                self.min_interval_seconds,
                self.max_interval_seconds
            );
        }

        if self.max_interval_seconds == 0 {
            anyhow::bail!("max_interval_seconds must be greater than 0");
        }

        if self.rapid_fire_min_interval_milliseconds > self.rapid_fire_max_interval_milliseconds {
            anyhow::bail!(
                "rapid_fire_min_interval_milliseconds ({}) cannot exceed rapid_fire_max_interval_milliseconds ({})",
                self.rapid_fire_min_interval_milliseconds,
                self.rapid_fire_max_interval_milliseconds
            );
        }

        if self.rapid_fire_count_min > self.rapid_fire_count_max {
            anyhow::bail!(
                "rapid_fire_count_min ({}) cannot exceed rapid_fire_count_max ({})",
                self.rapid_fire_count_min,
                self.rapid_fire_count_max
            );
        }

        if !(0.0..=1.0).contains(&self.rapid_fire_probability) {
            anyhow::bail!(
                "rapid_fire_probability must be between 0.0 and 1.0, got: {}",
                self.rapid_fire_probability
            );
        }

        if !(0.0..=1.0).contains(&self.response_probability) {
            anyhow::bail!(
                "response_probability must be between 0.0 and 1.0, got: {}",
                self.response_probability
            );
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("command_prefix cannot be empty");
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "command_prefix cannot contain whitespace, got: {:?}",
                self.command_prefix
            );
        }

        Ok(())
    }

    /// Immutable playback parameters shared by the scheduler and the burst trigger.
    pub fn playback(&self) -> PlaybackSettings {
        PlaybackSettings {
            min_interval: Duration::from_secs(self.min_interval_seconds),
            max_interval: Duration::from_secs(self.max_interval_seconds),
            rapid_fire_probability: self.rapid_fire_probability,
            rapid_fire_count_min: self.rapid_fire_count_min,
            rapid_fire_count_max: self.rapid_fire_count_max,
            rapid_fire_min_interval: Duration::from_millis(self.rapid_fire_min_interval_milliseconds),
            rapid_fire_max_interval: Duration::from_millis(self.rapid_fire_max_interval_milliseconds),
            overlap_groupings: self.overlap_groupings,
        }
    }

    pub fn excluded_set(&self) -> HashSet<String> {
        self.excluded_sounds.iter().cloned().collect()
    }

    /// Text that triggers a catalog refresh, e.g. `!refresh`.
    pub fn refresh_command(&self) -> String {
        format!("{}refresh", self.command_prefix)
    }

    /// Reply posted after a command, falling back to the built-in text.
    pub fn command_response(&self, command: &str) -> String {
        match self.command_responses.get(command) {
            Some(reply) => reply.clone(),
            None if command == "refresh" => DEFAULT_REFRESH_RESPONSE.to_string(),
            None => format!("Done: {}", command),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The bot token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: guild {} / voice channel {} (mute={}, deaf={})\n  \
            Interval: {}s - {}s\n  \
            Rapid fire: p={} count {}-{} every {}ms-{}ms (overlap={})\n  \
            Sounds: {} excluded, defaults={}, skip unavailable={}\n  \
            Commands: {} ({} responses)\n  \
            Voice responses: p={} ({} configured)",
            self.server_id,
            self.voice_channel_id,
            self.self_mute,
            self.self_deaf,
            self.min_interval_seconds,
            self.max_interval_seconds,
            self.rapid_fire_probability,
            self.rapid_fire_count_min,
            self.rapid_fire_count_max,
            self.rapid_fire_min_interval_milliseconds,
            self.rapid_fire_max_interval_milliseconds,
            self.overlap_groupings,
            self.excluded_sounds.len(),
            self.use_default_sounds,
            self.skip_unavailable_sounds,
            self.refresh_command(),
            self.command_responses.len(),
            self.response_probability,
            self.responses.len()
        )
    }
}

/// Default configuration values.
///
/// Used for every field missing from the YAML file.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            bot_token: String::new(),
            server_id: 0,
            voice_channel_id: 0,
            api_base_url: "https://discord.com/api/v10".to_string(),
            request_timeout_seconds: 10,

            self_mute: false,
            self_deaf: false,

            min_interval_seconds: 30,
            max_interval_seconds: 300,

            rapid_fire_probability: 0.0,
            rapid_fire_min_interval_milliseconds: 100,
            rapid_fire_max_interval_milliseconds: 300,
            rapid_fire_count_min: 0,
            rapid_fire_count_max: 0,
            overlap_groupings: true,

            excluded_sounds: Vec::new(),
            use_default_sounds: false,
            skip_unavailable_sounds: false,

            command_prefix: "!".to_string(),
            command_responses: HashMap::from([(
                "refresh".to_string(),
                DEFAULT_REFRESH_RESPONSE.to_string(),
            )]),

            response_probability: 0.0,
            responses: Vec::new(),
        }
    }
}

/// Sound ids as a list. A single env value such as `SOUNDBOARD_EXCLUDED_SOUNDS=111`
/// is parsed as a number rather than a list, so scalars are accepted too.
fn id_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdList {
        Many(Vec<Id>),
        One(Id),
    }

    let id = |id: Id| match id {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    };

    Ok(match IdList::deserialize(deserializer)? {
        IdList::Many(ids) => ids.into_iter().map(id).collect(),
        IdList::One(single) if matches!(&single, Id::Text(text) if text.is_empty()) => Vec::new(),
        IdList::One(single) => vec![id(single)],
    })
}

/// Playback parameters, fixed once the configuration is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub rapid_fire_probability: f32,
    pub rapid_fire_count_min: u32,
    pub rapid_fire_count_max: u32,
    pub rapid_fire_min_interval: Duration,
    pub rapid_fire_max_interval: Duration,
    /// When false, a cycle is skipped while the previous grouping is still
    /// dispatching its burst.
    pub overlap_groupings: bool,
}
