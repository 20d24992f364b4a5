use std::sync::Arc;

use tracing::warn;

use crate::auth::{
    jwt::TokenService,
    password::PasswordHasher,
    repo::{MemoryUserDirectory, PgUserDirectory, UserDirectory},
    services::AuthService,
};
use crate::config::{AppConfig, HashConfig, JwtConfig};
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Connects the user directory and runs migrations. Without a database
    /// URL (development only) accounts live in memory.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        if config.jwt.fallback {
            warn!("JWT_SECRET not set; signing tokens with the development secret");
        }

        let users: Arc<dyn UserDirectory> = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                Arc::new(PgUserDirectory::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory");
                Arc::new(MemoryUserDirectory::new())
            }
        };

        Self::from_parts(Arc::new(config), users)
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserDirectory>) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(config.hash)?;
        let tokens = TokenService::new(&config.jwt);
        let auth = Arc::new(AuthService::new(users, hasher, tokens));
        Ok(Self { config, auth })
    }

    /// In-memory state with a throwaway secret and a cheap work factor.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            env: crate::config::Environment::Development,
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                fallback: false,
            },
            hash: HashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
        });
        let users = Arc::new(MemoryUserDirectory::new()) as Arc<dyn UserDirectory>;
        Self::from_parts(config, users).expect("fake hash params are valid")
    }
}
