use std::str::FromStr;

/// How a detail route answers when the record exists but belongs to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// Answer 404, indistinguishable from a missing id.
    Conceal,
    /// Answer 403.
    Forbid,
}

impl FromStr for OwnershipPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conceal" | "not_found" | "404" => Ok(Self::Conceal),
            "forbid" | "forbidden" | "403" => Ok(Self::Forbid),
            other => anyhow::bail!("unknown ownership policy: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub password_min_length: usize,
    pub password_max_similarity: f64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub auth: AuthConfig,
    pub ownership: OwnershipPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let auth = AuthConfig {
            password_min_length: env_or("PASSWORD_MIN_LENGTH", 8),
            password_max_similarity: env_or("PASSWORD_MAX_SIMILARITY", 0.7),
        };
        let ownership = match std::env::var("OWNERSHIP_MISMATCH") {
            Ok(v) => v.parse()?,
            Err(_) => OwnershipPolicy::Conceal,
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            auth,
            ownership,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
