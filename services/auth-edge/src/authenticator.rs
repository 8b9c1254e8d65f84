//! Bearer-token authentication, framework-neutral.
//!
//! An [`Authenticator`] turns the `Authorization` header of a request into an
//! [`AuthContext`] or an [`AuthenticationFailure`]. Every outcome is written
//! to the audit target together with the caller's network origin.

use chrono::{DateTime, Utc};
use key_common::AUDIT_TARGET;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AuthMode, Config, ConfigError};
use crate::contracts::{PublicKeyResolver, TokenBlacklist, UserDetails, UserDirectory};
use crate::error::{AuthEdgeError, AuthenticationFailure};
use crate::jwt::TokenVerifier;

/// Request header carrying the token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Scheme prefix of a bearer credential, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from an `Authorization` header value.
///
/// Accepts exactly `Bearer <token>`: the scheme is case-sensitive, followed by
/// a single space and a non-empty token.
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty() && !token.starts_with(' '))
}

/// Identity established by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Token subject
    pub subject: String,
    /// Authorities granted by the token
    pub authorities: BTreeSet<String>,
    /// Key that verified the token
    pub kid: String,
    /// Token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Directory account, in strict mode
    pub user: Option<UserDetails>,
}

/// Collaborators strict mode consults.
#[derive(Clone)]
pub struct StrictCollaborators {
    /// Revoked-token lookup
    pub blacklist: Arc<dyn TokenBlacklist>,
    /// Account lookup
    pub directory: Arc<dyn UserDirectory>,
}

/// Authenticates bearer tokens in simple or strict mode.
pub struct Authenticator {
    verifier: TokenVerifier,
    strict: Option<StrictCollaborators>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("verifier", &self.verifier)
            .field("mode", &self.mode())
            .finish()
    }
}

impl Authenticator {
    /// Simple mode: token verification only.
    #[must_use]
    pub const fn simple(verifier: TokenVerifier) -> Self {
        Self {
            verifier,
            strict: None,
        }
    }

    /// Strict mode: verification, then the blacklist, then the directory.
    #[must_use]
    pub fn strict(
        verifier: TokenVerifier,
        blacklist: Arc<dyn TokenBlacklist>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            verifier,
            strict: Some(StrictCollaborators {
                blacklist,
                directory,
            }),
        }
    }

    /// Build the authenticator the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] when strict mode is configured
    /// without collaborators.
    pub fn from_config(
        config: &Config,
        resolver: Arc<dyn PublicKeyResolver>,
        collaborators: Option<StrictCollaborators>,
    ) -> Result<Self, ConfigError> {
        let verifier = TokenVerifier::from_config(resolver, config);
        match (config.auth_mode, collaborators) {
            (AuthMode::Simple, _) => Ok(Self::simple(verifier)),
            (AuthMode::Strict, Some(strict)) => Ok(Self {
                verifier,
                strict: Some(strict),
            }),
            (AuthMode::Strict, None) => Err(ConfigError::MissingRequired(
                "strict mode needs a token blacklist and a user directory".to_string(),
            )),
        }
    }

    /// Active mode.
    #[must_use]
    pub const fn mode(&self) -> AuthMode {
        if self.strict.is_some() {
            AuthMode::Strict
        } else {
            AuthMode::Simple
        }
    }

    /// Verifier used for every request.
    #[must_use]
    pub const fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Authenticate a request.
    ///
    /// `authorization` is the raw `Authorization` header, if present, and
    /// `origin` the caller's network address as seen by the edge.
    ///
    /// # Errors
    ///
    /// Returns a sanitized [`AuthenticationFailure`]; the detailed reason is
    /// only written to the audit log.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        origin: &str,
    ) -> Result<AuthContext, AuthenticationFailure> {
        match self.establish(authorization).await {
            Ok(context) => {
                info!(
                    target: AUDIT_TARGET,
                    subject = %context.subject,
                    origin = %origin,
                    mode = %self.mode(),
                    "Successful JWT authentication"
                );
                Ok(context)
            }
            Err(error) => {
                let failure = AuthenticationFailure::from_error(&error, Uuid::new_v4());
                warn!(
                    target: AUDIT_TARGET,
                    origin = %origin,
                    code = %failure.code,
                    correlation_id = %failure.correlation_id,
                    retryable = error.is_retryable(),
                    reason = %error,
                    "Failed JWT authentication attempt"
                );
                Err(failure)
            }
        }
    }

    async fn establish(&self, authorization: Option<&str>) -> Result<AuthContext, AuthEdgeError> {
        let raw = authorization
            .and_then(extract_bearer)
            .ok_or(AuthEdgeError::TokenMissing)?;

        let token = self.verifier.verify(raw)?;
        let mut context = AuthContext {
            subject: token.subject().to_string(),
            authorities: token.authorities().clone(),
            kid: token.kid().unwrap_or_default().to_string(),
            expires_at: token.expires_at(),
            user: None,
        };

        if let Some(strict) = &self.strict {
            if strict.blacklist.is_blacklisted(raw).await? {
                return Err(AuthEdgeError::TokenRevoked);
            }

            let user = strict
                .directory
                .load_user(&context.subject)
                .await?
                .ok_or_else(|| AuthEdgeError::UnknownSubject {
                    subject: context.subject.clone(),
                })?;
            if !user.enabled {
                return Err(AuthEdgeError::AccountDisabled {
                    subject: context.subject,
                });
            }
            context.user = Some(user);
        }

        Ok(context)
    }
}
