// src/services/oauth.rs
use crate::common::OAuthCredentials;
use reqwest::{header::ACCEPT, header::USER_AGENT, Client};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("OAuth provider not configured: {0}")]
    NotConfigured(Provider),

    #[error("Unknown OAuth provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// External identity providers supported for sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::GitHub, Provider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Google => "Google",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com/login/oauth/authorize",
            Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://github.com/login/oauth/access_token",
            Provider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    fn scopes(&self) -> &'static str {
        match self {
            Provider::GitHub => "read:user user:email",
            Provider::Google => "openid email profile",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "google" => Ok(Provider::Google),
            other => Err(OAuthError::UnknownProvider(other.to_string())),
        }
    }
}

/// Identity returned by a provider after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: Provider,
    pub provider_account_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Token endpoint payload. GitHub reports failures with a 200 and an `error` field.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub fn into_access_token(self) -> Result<String, OAuthError> {
        match (self.access_token, self.error) {
            (Some(token), None) if !token.is_empty() => Ok(token),
            (_, Some(error)) => Err(OAuthError::OAuthFailed(match self.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            })),
            _ => Err(OAuthError::OAuthFailed(
                "token response missing access_token".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Picks the primary verified address, falling back to any verified one
pub fn pick_github_email(emails: &[GitHubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

impl OAuthProfile {
    pub fn from_github(user: GitHubUser, emails: &[GitHubEmail]) -> Self {
        let email = user
            .email
            .filter(|e| !e.is_empty())
            .or_else(|| pick_github_email(emails));

        Self {
            provider: Provider::GitHub,
            provider_account_id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
            image: user.avatar_url,
        }
    }

    pub fn from_google(info: GoogleUserInfo) -> Self {
        if info.email_verified == Some(false) {
            warn!(provider = "google", "Google profile contains unverified email address");
        }

        Self {
            provider: Provider::Google,
            provider_account_id: info.sub,
            email: info.email,
            name: info.name,
            image: info.picture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthService {
    client: Client,
    github: Option<OAuthCredentials>,
    google: Option<OAuthCredentials>,
}

impl OAuthService {
    pub fn new(
        client: Client,
        github: Option<OAuthCredentials>,
        google: Option<OAuthCredentials>,
    ) -> Self {
        Self {
            client,
            github,
            google,
        }
    }

    fn credentials(&self, provider: Provider) -> Result<&OAuthCredentials, OAuthError> {
        let credentials = match provider {
            Provider::GitHub => self.github.as_ref(),
            Provider::Google => self.google.as_ref(),
        };
        credentials.ok_or(OAuthError::NotConfigured(provider))
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.credentials(provider).is_ok()
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.is_configured(*p))
            .collect()
    }

    /// Get authorization URL for the provider's consent screen
    pub fn authorization_url(
        &self,
        provider: Provider,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, OAuthError> {
        let credentials = self.credentials(provider)?;

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            provider.authorize_endpoint(),
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(provider.scopes()),
            urlencoding::encode(state),
        );

        debug!(provider = %provider, "Generated OAuth authorization URL");
        Ok(auth_url)
    }

    /// Exchange authorization code for an access token
    pub async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let credentials = self.credentials(provider)?;

        let params = [
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        debug!(provider = %provider, "Exchanging authorization code for tokens");

        let response = self
            .client
            .post(provider.token_endpoint())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = %provider, status = %status, error = %error_text, "Token exchange failed");
            return Err(OAuthError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::SerializationError(e.to_string()))?;

        let access_token = token_response.into_access_token()?;
        info!(provider = %provider, "Successfully exchanged authorization code for tokens");
        Ok(access_token)
    }

    /// Fetch the signed-in identity for an access token
    pub async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<OAuthProfile, OAuthError> {
        match provider {
            Provider::GitHub => {
                let user: GitHubUser = self
                    .get_json("https://api.github.com/user", access_token)
                    .await?;

                let emails: Vec<GitHubEmail> = if user.email.as_deref().unwrap_or("").is_empty() {
                    self.get_json("https://api.github.com/user/emails", access_token)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "Failed to list GitHub emails");
                            Vec::new()
                        })
                } else {
                    Vec::new()
                };

                Ok(OAuthProfile::from_github(user, &emails))
            }
            Provider::Google => {
                let info: GoogleUserInfo = self
                    .get_json(
                        "https://openidconnect.googleapis.com/v1/userinfo",
                        access_token,
                    )
                    .await?;
                Ok(OAuthProfile::from_google(info))
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(USER_AGENT, "groove")
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::RequestFailed(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| OAuthError::SerializationError(e.to_string()))
    }
}
