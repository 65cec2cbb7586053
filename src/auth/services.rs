//! User store: credential accounts, password verification and OAuth account linking

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::models::{AuthUser, CredentialsRequest, SignupRequest, User};
use crate::common::{
    generate_account_id, generate_user_id, safe_email_log, ApiError, Validator,
};
use crate::services::OAuthProfile;

/// bcrypt work factor for stored password hashes
pub const PASSWORD_HASH_COST: u32 = 10;

/// Fresh ids tried before an insert gives up on primary-key collisions
const MAX_ID_ATTEMPTS: u32 = 3;

/// Sign-in failures. The messages are shown to the user verbatim.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidInput,

    #[error("User not found")]
    UserNotFound,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Provider profile has no email address")]
    MissingEmail,

    #[error("Account is linked to another identity for this provider")]
    AccountNotLinked,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput | AuthError::UserNotFound | AuthError::IncorrectPassword => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::MissingEmail => ApiError::BadRequest(err.to_string()),
            AuthError::AccountNotLinked => ApiError::Conflict(err.to_string()),
            AuthError::Hashing(msg) => ApiError::InternalServer(msg),
            AuthError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_HASH_COST))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub struct UsersService {
    db: SqlitePool,
}

impl UsersService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
    }

    #[cfg(test)]
    pub async fn accounts_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<super::models::Account>, sqlx::Error> {
        sqlx::query_as::<_, super::models::Account>(
            "SELECT * FROM accounts WHERE user_id = ? ORDER BY created_at ASC, provider ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
    }

    /// Creates a credentials user: validates, checks uniqueness, stores a bcrypt hash
    pub async fn create_credentials_user(&self, request: SignupRequest) -> Result<User, ApiError> {
        self.create_credentials_user_with(request, generate_user_id).await
    }

    pub(crate) async fn create_credentials_user_with<F>(
        &self,
        request: SignupRequest,
        mut next_id: F,
    ) -> Result<User, ApiError>
    where
        F: FnMut() -> String + Send,
    {
        let validation_result = request.validate(&request);
        if !validation_result.is_valid {
            debug!(errors = ?validation_result.errors, "Signup validation failed");
            return Err(ApiError::BadRequest("Invalid input".to_string()));
        }

        let SignupRequest { email, password } = request;

        if self
            .find_by_email(&email)
            .await
            .map_err(ApiError::DatabaseError)?
            .is_some()
        {
            info!(email = %safe_email_log(&email), "Signup rejected: user already exists");
            return Err(ApiError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(password).await?;

        let mut attempt = 1;
        let id = loop {
            let id = next_id();
            let inserted =
                sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)")
                    .bind(&id)
                    .bind(&email)
                    .bind(&password_hash)
                    .execute(&self.db)
                    .await;

            match inserted {
                Ok(_) => break id,
                Err(e) if is_unique_violation(&e) => {
                    // Either a concurrent signup took the email or the id collided
                    if self
                        .find_by_email(&email)
                        .await
                        .map_err(ApiError::DatabaseError)?
                        .is_some()
                    {
                        return Err(ApiError::Conflict("User already exists".to_string()));
                    }
                    if attempt >= MAX_ID_ATTEMPTS {
                        error!(error = %e, "Giving up after repeated user id collisions");
                        return Err(ApiError::DatabaseError(e));
                    }
                    warn!(user_id = %id, attempt, "User id collision, retrying with a new id");
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, email = %safe_email_log(&email), "Database error inserting new user");
                    return Err(ApiError::DatabaseError(e));
                }
            }
        };

        info!(user_id = %id, email = %safe_email_log(&email), "New credentials user created");

        self.find_by_id(&id)
            .await
            .map_err(ApiError::DatabaseError)?
            .ok_or_else(|| ApiError::InternalServer("created user not found".to_string()))
    }

    /// Credential verification for email + password sign-in
    pub async fn authorize_credentials(
        &self,
        request: &CredentialsRequest,
    ) -> Result<AuthUser, AuthError> {
        if !request.validate(request).is_valid {
            return Err(AuthError::InvalidInput);
        }

        // OAuth-only users have no password hash and cannot use credentials
        let Some(mut user) = self.find_by_email(&request.email).await? else {
            warn!(email = %safe_email_log(&request.email), "Credentials sign-in: user not found");
            return Err(AuthError::UserNotFound);
        };
        let Some(hash) = user.password_hash.take().filter(|h| !h.is_empty()) else {
            warn!(user_id = %user.id, "Credentials sign-in: account has no password");
            return Err(AuthError::UserNotFound);
        };

        if !verify_password(request.password.clone(), hash).await? {
            warn!(user_id = %user.id, "Credentials sign-in: incorrect password");
            return Err(AuthError::IncorrectPassword);
        }

        debug!(user_id = %user.id, "Credentials verified");
        Ok(AuthUser::from(user))
    }

    /// Sign-in callback for OAuth providers.
    ///
    /// Creates the user on first sign-in, links the provider account otherwise,
    /// and returns the user that owns the provider identity. Runs in one
    /// transaction; the unique constraints on `users.email` and
    /// `accounts(provider, provider_account_id)` make concurrent first sign-ins
    /// converge on a single user and a single account. A user row created here
    /// is rolled back when the identity turns out to belong to someone else.
    pub async fn link_oauth_account(&self, profile: &OAuthProfile) -> Result<AuthUser, AuthError> {
        self.link_oauth_account_with(profile, generate_user_id, generate_account_id)
            .await
    }

    pub(crate) async fn link_oauth_account_with<U, A>(
        &self,
        profile: &OAuthProfile,
        mut next_user_id: U,
        mut next_account_id: A,
    ) -> Result<AuthUser, AuthError>
    where
        U: FnMut() -> String + Send,
        A: FnMut() -> String + Send,
    {
        let email = profile
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::MissingEmail)?;
        let provider = profile.provider.as_str();

        let mut tx = self.db.begin().await?;

        // A conflict on the email is absorbed; one on the id is retried
        let mut attempt = 1;
        let created = loop {
            let inserted = sqlx::query(
                "INSERT INTO users (id, email, name, image) VALUES (?, ?, ?, ?) ON CONFLICT(email) DO NOTHING",
            )
            .bind(next_user_id())
            .bind(email)
            .bind(profile.name.as_deref().unwrap_or(""))
            .bind(profile.image.as_deref().unwrap_or(""))
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => break result.rows_affected() > 0,
                Err(e) if is_unique_violation(&e) && attempt < MAX_ID_ATTEMPTS => {
                    warn!(attempt, "User id collision during OAuth sign-in, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&mut *tx)
            .await?;

        let mut attempt = 1;
        let linked = loop {
            let inserted = sqlx::query(
                r#"
                INSERT INTO accounts (id, user_id, provider, provider_account_id, provider_type)
                VALUES (?, ?, ?, ?, 'oauth')
                ON CONFLICT(provider, provider_account_id) DO NOTHING
                ON CONFLICT(user_id, provider) DO NOTHING
                "#,
            )
            .bind(next_account_id())
            .bind(&user.id)
            .bind(provider)
            .bind(&profile.provider_account_id)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => break result.rows_affected() > 0,
                Err(e) if is_unique_violation(&e) && attempt < MAX_ID_ATTEMPTS => {
                    warn!(attempt, "Account id collision during OAuth sign-in, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let owner = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN accounts a ON a.user_id = u.id
            WHERE a.provider = ? AND a.provider_account_id = ?
            "#,
        )
        .bind(provider)
        .bind(&profile.provider_account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let owned_by_user = owner.as_ref().is_some_and(|o| o.id == user.id);
        if created && !owned_by_user {
            tx.rollback().await?;
            debug!(
                email = %safe_email_log(email),
                provider = %provider,
                "Discarded new user: provider identity belongs to another user"
            );
        } else {
            tx.commit().await?;
        }

        match owner {
            Some(owner) => {
                if created && owned_by_user {
                    info!(
                        user_id = %owner.id,
                        email = %safe_email_log(email),
                        provider = %provider,
                        "Creating new user account via OAuth"
                    );
                } else if linked {
                    info!(
                        user_id = %owner.id,
                        provider = %provider,
                        "Linked OAuth account to existing user"
                    );
                }
                Ok(AuthUser::from(owner))
            }
            None => {
                warn!(
                    user_id = %user.id,
                    provider = %provider,
                    "User already has a different account for this provider"
                );
                Err(AuthError::AccountNotLinked)
            }
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
