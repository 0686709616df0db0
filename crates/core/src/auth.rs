//! Identity provider integration.
//!
//! Doctors authenticate with an email address and password against an external identity
//! provider. The provider issues an opaque id token which the REST layer later verifies on
//! every request. [`FirebaseAuthClient`] talks to the Firebase Identity Toolkit REST API;
//! tests substitute their own [`AuthProvider`].

use crate::constants::FIREBASE_AUTH_BASE;
use async_trait::async_trait;
use medirx_types::EmailAddress;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email address is already registered")]
    EmailInUse,
    #[error("Password is too weak: {0}")]
    WeakPassword(String),
    #[error("Invalid or expired session token")]
    InvalidToken,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("malformed identity provider response: {0}")]
    MalformedResponse(String),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// An authenticated user as reported by the identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: Option<EmailAddress>,
    pub id_token: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_user(&self, email: &EmailAddress, password: &str) -> AuthResult<Identity>;

    async fn sign_in(&self, email: &EmailAddress, password: &str) -> AuthResult<Identity>;

    /// Ends the provider-side session. Token-based providers have nothing to revoke.
    async fn sign_out(&self, _identity: &Identity) -> AuthResult<()> {
        Ok(())
    }

    /// Resolves an id token to the identity it was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is unknown or expired.
    async fn verify(&self, id_token: &str) -> AuthResult<Identity>;
}

/// Firebase Identity Toolkit client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for FirebaseAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuthClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: FIREBASE_AUTH_BASE.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> AuthResult<T> {
        let url = format!("{}/v1/accounts:{}", self.endpoint, method);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(map_provider_error(status.as_u16(), &message));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    async fn password_flow(
        &self,
        method: &str,
        email: &EmailAddress,
        password: &str,
    ) -> AuthResult<Identity> {
        let response: PasswordResponse = self
            .call(
                method,
                json!({
                    "email": email.as_str(),
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let email = match response.email {
            Some(raw) => Some(parse_provider_email(&raw)?),
            None => Some(email.clone()),
        };
        Ok(Identity {
            uid: response.local_id,
            email,
            id_token: response.id_token,
        })
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuthClient {
    async fn create_user(&self, email: &EmailAddress, password: &str) -> AuthResult<Identity> {
        self.password_flow("signUp", email, password).await
    }

    async fn sign_in(&self, email: &EmailAddress, password: &str) -> AuthResult<Identity> {
        self.password_flow("signInWithPassword", email, password).await
    }

    async fn verify(&self, id_token: &str) -> AuthResult<Identity> {
        let response: LookupResponse = self
            .call("lookup", json!({ "idToken": id_token }))
            .await
            .map_err(|e| match e {
                AuthError::Upstream { status: 400, .. } => AuthError::InvalidToken,
                other => other,
            })?;

        let user = response
            .users
            .into_iter()
            .next()
            .ok_or(AuthError::InvalidToken)?;
        let email = user.email.as_deref().map(parse_provider_email).transpose()?;

        Ok(Identity {
            uid: user.local_id,
            email,
            id_token: id_token.to_string(),
        })
    }
}

fn parse_provider_email(raw: &str) -> AuthResult<EmailAddress> {
    EmailAddress::parse(raw).map_err(|e| AuthError::MalformedResponse(e.to_string()))
}

/// Maps an Identity Toolkit error message (`CODE` or `CODE : detail`) to an [`AuthError`].
fn map_provider_error(status: u16, message: &str) -> AuthError {
    let code = message.split(':').next().unwrap_or_default().trim();
    match code {
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailInUse,
        "WEAK_PASSWORD" => AuthError::WeakPassword(
            message
                .split_once(':')
                .map(|(_, detail)| detail.trim().to_string())
                .unwrap_or_default(),
        ),
        "INVALID_EMAIL" => AuthError::InvalidInput("invalid email address".into()),
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => AuthError::InvalidToken,
        _ => AuthError::Upstream {
            status,
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    fn firebase_error(message: &str) -> axum::response::Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "code": 400, "message": message } })),
        )
            .into_response()
    }

    /// Fake Identity Toolkit: one known user (`known@clinic.test` / `secret1`).
    async fn fake_provider(Path(method): Path<String>, Json(body): Json<Value>) -> axum::response::Response {
        match method.as_str() {
            "accounts:signUp" => {
                if body["email"] == "known@clinic.test" {
                    return firebase_error("EMAIL_EXISTS");
                }
                if body["password"].as_str().unwrap_or("").len() < 6 {
                    return firebase_error(
                        "WEAK_PASSWORD : Password should be at least 6 characters",
                    );
                }
                Json(json!({
                    "localId": "newUid123",
                    "idToken": "token-new",
                    "email": body["email"],
                }))
                .into_response()
            }
            "accounts:signInWithPassword" => {
                if body["email"] == "known@clinic.test" && body["password"] == "secret1" {
                    Json(json!({
                        "localId": "knownUid1",
                        "idToken": "token-known",
                        "email": "known@clinic.test",
                    }))
                    .into_response()
                } else {
                    firebase_error("INVALID_LOGIN_CREDENTIALS")
                }
            }
            "accounts:lookup" => {
                if body["idToken"] == "token-known" {
                    Json(json!({ "users": [{ "localId": "knownUid1", "email": "known@clinic.test" }] }))
                        .into_response()
                } else {
                    firebase_error("INVALID_ID_TOKEN")
                }
            }
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn client() -> FirebaseAuthClient {
        let app = Router::new().route("/v1/:method", post(fake_provider));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        FirebaseAuthClient::new("test-key").with_endpoint(format!("http://{addr}"))
    }

    #[test]
    fn test_map_provider_error_codes() {
        assert!(matches!(
            map_provider_error(400, "INVALID_PASSWORD"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            map_provider_error(400, "EMAIL_NOT_FOUND"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            map_provider_error(400, "EMAIL_EXISTS"),
            AuthError::EmailInUse
        ));
        assert!(matches!(
            map_provider_error(400, "TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::Upstream { status: 400, .. }
        ));
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }

    #[tokio::test]
    async fn test_sign_in_with_valid_credentials() {
        let client = client().await;
        let identity = client
            .sign_in(&email("Known@Clinic.test"), "secret1")
            .await
            .expect("sign in should succeed");

        assert_eq!(identity.uid, "knownUid1");
        assert_eq!(identity.id_token, "token-known");
        assert_eq!(identity.email.unwrap().as_str(), "known@clinic.test");
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password() {
        let client = client().await;
        let err = client
            .sign_in(&email("known@clinic.test"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_create_user_errors() {
        let client = client().await;

        let err = client
            .create_user(&email("known@clinic.test"), "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailInUse));

        let err = client
            .create_user(&email("new@clinic.test"), "123")
            .await
            .unwrap_err();
        match err {
            AuthError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_user_returns_identity() {
        let client = client().await;
        let identity = client
            .create_user(&email("new@clinic.test"), "secret99")
            .await
            .unwrap();
        assert_eq!(identity.uid, "newUid123");
    }

    #[tokio::test]
    async fn test_verify_token() {
        let client = client().await;

        let identity = client.verify("token-known").await.unwrap();
        assert_eq!(identity.uid, "knownUid1");

        let err = client.verify("forged").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn test_identity_debug_hides_token() {
        let identity = Identity {
            uid: "u1".into(),
            email: None,
            id_token: "very-secret".into(),
        };
        assert!(!format!("{identity:?}").contains("very-secret"));
    }
}
