use crate::application_port::{TokenCodec, TokenError, VerifiedClaims};
use crate::domain_model::*;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest lifetime accepted for either token kind.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl JwtConfig {
    /// Reject configurations that would weaken the access/refresh split.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            anyhow::bail!("jwt secrets must not be empty");
        }
        if self.access_secret == self.refresh_secret {
            anyhow::bail!("access and refresh secrets must differ");
        }
        if self.access_ttl.is_zero() || self.access_ttl >= self.refresh_ttl {
            anyhow::bail!(
                "access ttl ({:?}) must be non-zero and shorter than refresh ttl ({:?})",
                self.access_ttl,
                self.refresh_ttl
            );
        }
        if self.refresh_ttl > MAX_TOKEN_TTL {
            anyhow::bail!(
                "refresh ttl ({:?}) exceeds the maximum of {:?}",
                self.refresh_ttl,
                MAX_TOKEN_TTL
            );
        }
        Ok(())
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    sid: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    refresh: bool,
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedClaims(err.to_string()),
    }
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock instead
        v.validate_exp = false;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }
}

impl TokenCodec for JwtHs256Codec {
    fn sign(
        &self,
        kind: TokenKind,
        user_id: UserId,
        session_id: &SessionId,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let secret = self.cfg.secret(kind);
        if secret.is_empty() {
            return Err(TokenError::Signing(format!("empty {:?} secret", kind)));
        }
        let exp_dt = TimeDelta::from_std(self.cfg.ttl(kind))
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| TokenError::Signing(format!("{:?} ttl out of range", kind)))?;
        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            exp: exp_dt.timestamp(),
            iat: issued_at.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            refresh: kind == TokenKind::Refresh,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn verify(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, TokenError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.cfg.secret(kind)),
            &self.validation(),
        )
        .map_err(classify)?
        .claims;

        if claims.refresh != (kind == TokenKind::Refresh) {
            return Err(TokenError::MalformedClaims(format!(
                "refresh flag does not match {:?} token",
                kind
            )));
        }
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|e| TokenError::MalformedClaims(format!("sub: {e}")))?;
        let session_id = claims
            .sid
            .parse::<SessionId>()
            .map_err(|e| TokenError::MalformedClaims(e.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| TokenError::MalformedClaims("exp out of range".to_string()))?;
        if expires_at <= now {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedClaims {
            kind,
            user_id,
            session_id,
            expires_at,
        })
    }
}
