use std::fmt;
use std::str::FromStr;

use anyhow::Context;

/// Secret used only when `APP_ENV=development` and `JWT_SECRET` is unset.
pub const DEV_JWT_SECRET: &str = "recipehub-development-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("unknown APP_ENV {other:?}"),
        }
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// True when the dev fallback secret is in use.
    pub fallback: bool,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Argon2 work factor.
#[derive(Debug, Clone, Copy)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    /// `None` only in development, where accounts are kept in memory.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = match get("APP_ENV") {
            Some(v) => v.parse::<Environment>()?,
            None => Environment::Production,
        };

        let jwt = match (get("JWT_SECRET"), env) {
            (Some(secret), _) => JwtConfig {
                secret,
                fallback: false,
            },
            (None, Environment::Development) => JwtConfig {
                secret: DEV_JWT_SECRET.into(),
                fallback: true,
            },
            (None, Environment::Production) => {
                anyhow::bail!("JWT_SECRET must be set outside development")
            }
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && env == Environment::Production {
            anyhow::bail!("DATABASE_URL must be set outside development");
        }

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&get, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            env,
            database_url,
            jwt,
            hash,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
