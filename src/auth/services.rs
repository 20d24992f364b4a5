use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    error::AuthError,
    jwt::TokenService,
    password::PasswordHasher,
    repo::UserDirectory,
    repo_types::{DirectoryError, NewUser, User, UserUpdate},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Identity fields; checked before the directory is consulted.
fn validate_identity(req: &RegisterRequest) -> Result<(), AuthError> {
    if req.name.trim().is_empty() {
        return Err(AuthError::Validation("Name is required".into()));
    }
    if req.email.trim().is_empty() {
        return Err(AuthError::Validation("Email is required".into()));
    }
    if !is_valid_email(&req.email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(())
}

/// Checked after the duplicate lookup, so a taken email wins over a weak password.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

fn validate_login(req: &LoginRequest) -> Result<(), AuthError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required".into(),
        ));
    }
    Ok(())
}

/// Result of a successful registration or login.
#[derive(Debug)]
pub struct Authenticated {
    pub token: String,
    pub user: User,
}

/// Registration and login flows over a user directory.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserDirectory>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<Authenticated, AuthError> {
        validate_identity(&req)?;

        // Pre-check only; insert below is authoritative.
        match self.users.find_by_email(&req.email).await {
            Ok(Some(_)) => {
                warn!("registration for existing email");
                return Err(AuthError::DuplicateAccount);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "find_by_email failed");
                return Err(AuthError::Persistence);
            }
        }

        validate_password(&req.password)?;

        let password_hash = self.hasher.hash(&req.password).await.map_err(|e| {
            error!(error = %e, "hash_password failed");
            AuthError::Persistence
        })?;

        let new_user = NewUser {
            name: req.name,
            email: req.email,
            password_hash,
        };
        let user = match self.users.insert(new_user).await {
            Ok(u) => u,
            Err(DirectoryError::Duplicate(_)) => {
                warn!("registration lost uniqueness race");
                return Err(AuthError::DuplicateAccount);
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                return Err(AuthError::Persistence);
            }
        };

        let token = self.issue(user.id)?;
        info!(user_id = %user.id, "user registered");
        Ok(Authenticated { token, user })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<Authenticated, AuthError> {
        validate_login(&req)?;

        let user = match self.users.find_by_email(&req.email).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                warn!("login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, "find_by_email failed");
                return Err(AuthError::Persistence);
            }
        };

        let ok = self
            .hasher
            .verify(&req.password, &user.password_hash)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "verify_password failed");
                AuthError::Persistence
            })?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Authenticated { token, user })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        match self.users.find_by_id(user_id).await {
            Ok(Some(u)) => Ok(u),
            Ok(None) => {
                warn!(%user_id, "token subject no longer exists");
                Err(AuthError::NotFound)
            }
            Err(e) => {
                error!(error = %e, %user_id, "find_by_id failed");
                Err(AuthError::Persistence)
            }
        }
    }

    pub async fn rename(&self, user_id: Uuid, name: String) -> Result<User, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }
        let update = UserUpdate { name: Some(name) };
        match self.users.update(user_id, update).await {
            Ok(u) => Ok(u),
            Err(DirectoryError::NotFound(_)) => Err(AuthError::NotFound),
            Err(e) => {
                error!(error = %e, %user_id, "update user failed");
                Err(AuthError::Persistence)
            }
        }
    }

    fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.tokens.issue(user_id).map_err(|e| {
            error!(error = %e, %user_id, "jwt sign failed");
            AuthError::Persistence
        })
    }
}
