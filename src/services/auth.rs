// src/services/auth.rs

use std::sync::Arc;

use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::Config,
    db::UserRepository,
    models::auth::{AuthResponse, Claims, User},
};

const PHONE_CODE_TTL_MINUTES: i64 = 5;
const PHONE_CODE_MAX_ATTEMPTS: i32 = 5;

// ---
// Entrega do código por telefone
// ---

#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError>;
}

/// Envia o código por um gateway SMS HTTP (POST JSON).
pub struct HttpSmsSender {
    client: reqwest::Client,
    url: String,
}

impl HttpSmsSender {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait]
impl CodeSender for HttpSmsSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError> {
        self.client
            .post(&self.url)
            .json(&json!({ "phone": phone, "message": format!("Код входа: {code}") }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Desenvolvimento: sem gateway, o código só aparece no log.
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError> {
        tracing::debug!(phone, code, "📱 Код входа (SMS-шлюз не настроен)");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct OAuthUserInfo {
    email: Option<String>,
}

// ---
// Funções puras (tokens e códigos)
// ---

pub(crate) fn encode_claims(secret: &str, claims: &Claims) -> Result<String, AppError> {
    Ok(encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_ref()))?)
}

pub(crate) fn decode_claims(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

/// Código numérico de 6 dígitos, com zeros à esquerda.
pub(crate) fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:06}")
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    config: Arc<Config>,
    code_sender: Arc<dyn CodeSender>,
    http: reqwest::Client,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, config: Arc<Config>, code_sender: Arc<dyn CodeSender>) -> Self {
        Self { user_repo, config, code_sender, http: reqwest::Client::new() }
    }

    // =========================================================================
    //  LOGIN POR SENHA
    // =========================================================================

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidCredentials)?;

        let Some(password_hash) = user.password_hash.clone() else {
            // Usuário só de telefone/OAuth
            return Err(AppError::InvalidCredentials);
        };

        let password_clone = password.to_owned();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            tracing::warn!(user_id = %user.id, "Senha incorreta no login");
            return Err(AppError::InvalidCredentials);
        }

        self.issue_session(user, "password").await
    }

    // =========================================================================
    //  LOGIN OAUTH
    // =========================================================================

    pub async fn login_oauth(&self, access_token: &str) -> Result<AuthResponse, AppError> {
        let url = self
            .config
            .oauth_userinfo_url
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("Вход через OAuth не настроен".into()))?;

        let response = self.http.get(url).bearer_auth(access_token).send().await?;

        if response.status().is_client_error() {
            tracing::warn!(status = %response.status(), "Provedor OAuth recusou o token");
            return Err(AppError::InvalidCredentials);
        }

        let info: OAuthUserInfo = response.error_for_status()?.json().await?;
        let email = info.email.ok_or(AppError::InvalidCredentials)?;

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                tracing::warn!(email = %email, "Login OAuth sem usuário correspondente");
                AppError::InvalidCredentials
            })?;

        self.issue_session(user, "oauth").await
    }

    // =========================================================================
    //  LOGIN POR TELEFONE + CÓDIGO
    // =========================================================================

    /// Sempre responde OK: não revela se o telefone está cadastrado.
    pub async fn request_phone_code(&self, phone: &str) -> Result<(), AppError> {
        let user = self.user_repo.find_by_phone(phone).await?.filter(|u| u.is_active);
        if user.is_none() {
            tracing::warn!(phone, "Código pedido para telefone desconhecido");
            return Ok(());
        }

        let code = generate_code();
        let code_clone = code.clone();
        let code_hash = tokio::task::spawn_blocking(move || hash(&code_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let expires_at = Utc::now() + Duration::minutes(PHONE_CODE_TTL_MINUTES);
        self.user_repo.upsert_phone_code(phone, &code_hash, expires_at).await?;

        self.code_sender.send_code(phone, &code).await
    }

    pub async fn verify_phone_code(&self, phone: &str, code: &str) -> Result<AuthResponse, AppError> {
        let Some(stored) = self
            .user_repo
            .consume_phone_code_attempt(phone, PHONE_CODE_MAX_ATTEMPTS)
            .await?
        else {
            // Vencido, esgotado ou inexistente: não sobra nada para tentar
            self.user_repo.delete_phone_code(phone).await?;
            return Err(AppError::InvalidCredentials);
        };

        let code_clone = code.to_owned();
        let code_hash = stored.code_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify(&code_clone, &code_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de código: {}", e))??;

        if !matches {
            tracing::warn!(phone, attempts = stored.attempts, "Código incorreto");
            return Err(AppError::InvalidCredentials);
        }

        // Código é de uso único
        if !self.user_repo.redeem_phone_code(phone, &stored.code_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let user = self
            .user_repo
            .find_by_phone(phone)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidCredentials)?;

        self.issue_session(user, "phone").await
    }

    // =========================================================================
    //  SESSÕES E TOKENS
    // =========================================================================

    /// Token válido = assinatura ok + sessão ativa + usuário ativo.
    pub async fn validate_token(&self, token: &str) -> Result<(User, Uuid), AppError> {
        let claims = decode_claims(&self.config.jwt_secret, token)?;

        let session = self
            .user_repo
            .find_active_session(claims.sid)
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or(AppError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidToken)?;

        Ok((user, session.id))
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AppError> {
        self.user_repo.revoke_session(session_id).await
    }

    async fn issue_session(&self, user: User, method: &str) -> Result<AuthResponse, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.session_ttl_hours);

        let session = self.user_repo.create_session(user.id, method, expires_at).await?;

        let claims = Claims {
            sub: user.id,
            sid: session.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode_claims(&self.config.jwt_secret, &claims)?;

        tracing::info!(user_id = %user.id, method, "🔑 Sessão iniciada");

        Ok(AuthResponse { token, expires_at, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserRole;
    use chrono::DateTime;

    fn claims(exp: DateTime<Utc>) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            role: UserRole::Master,
            exp: exp.timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        }
    }

    #[test]
    fn token_round_trips_with_the_same_secret() {
        let original = claims(Utc::now() + Duration::hours(1));
        let token = encode_claims("segredo", &original).unwrap();

        let decoded = decode_claims("segredo", &token).unwrap();
        assert_eq!(decoded.sub, original.sub);
        assert_eq!(decoded.sid, original.sid);
        assert_eq!(decoded.role, UserRole::Master);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = encode_claims("segredo", &claims(Utc::now() + Duration::hours(1))).unwrap();
        assert!(matches!(decode_claims("outro", &token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = encode_claims("segredo", &claims(Utc::now() - Duration::hours(2))).unwrap();
        assert!(matches!(decode_claims("segredo", &token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn generated_codes_have_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
