use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::UtcOffset;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub gamification: Gamification,
    pub log: LogConfig,
}

impl Config {
    /// Load from a toml file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cert: None,
            key: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
    pub max_connections: u32,
    pub syllabus_cache_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("database/englearn.db"),
            max_connections: 8,
            syllabus_cache_capacity: 64,
        }
    }
}

/// Token verification settings. Exactly one of `secret` (HS256) or
/// `public_key` (RS256 PEM file) is used; the secret may also come from
/// the `AUTH_SECRET` environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub project_id: Option<String>,
    pub secret: Option<String>,
    pub public_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Gamification {
    pub points_per_chapter: u64,
    pub points_per_level: u64,
    /// share of correct answers needed to pass a chapter quiz
    pub quiz_pass_ratio: f64,
    /// offset used to decide which calendar day a login falls on
    #[serde(with = "offset_hours")]
    pub streak_offset: UtcOffset,
}

impl Default for Gamification {
    fn default() -> Self {
        Self {
            points_per_chapter: 10,
            points_per_level: 100,
            quiz_pass_ratio: 0.7,
            streak_offset: UtcOffset::UTC,
        }
    }
}

impl Gamification {
    pub fn level_for(&self, points: u64) -> u64 {
        points / self.points_per_level.max(1) + 1
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
}

/// Offsets are written as whole hours in the config file, e.g. `streak_offset = 8`.
mod offset_hours {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::UtcOffset;

    pub fn serialize<S: Serializer>(offset: &UtcOffset, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(offset.whole_hours())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcOffset, D::Error> {
        let hours = i8::deserialize(deserializer)?;
        UtcOffset::from_hms(hours, 0, 0).map_err(D::Error::custom)
    }
}
