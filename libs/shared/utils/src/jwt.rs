use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, JwtHeader, TokenPair, TokenType, User};

type HmacSha256 = Hmac<Sha256>;

fn sign(signing_input: &str, secret: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Issues an HS256 token carrying `{id, email, role}` for `user`.
pub fn issue_token(
    user: &User,
    token_type: TokenType,
    secret: &str,
    ttl: Duration,
) -> Result<String, String> {
    if secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        token_type,
        iat: now.timestamp().max(0) as u64,
        exp: (now + ttl).timestamp().max(0) as u64,
    };

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_json = serde_json::to_string(&claims).map_err(|e| e.to_string())?;
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);

    let signing_input = format!("{}.{}", header_b64, claims_b64);
    let signature = sign(&signing_input, secret)?;

    Ok(format!("{}.{}", signing_input, signature))
}

pub fn issue_token_pair(user: &User, config: &AppConfig) -> Result<TokenPair, String> {
    Ok(TokenPair {
        access_token: issue_access_token(user, config)?,
        refresh_token: issue_token(
            user,
            TokenType::Refresh,
            &config.jwt_refresh_secret,
            Duration::days(config.refresh_token_ttl_days),
        )?,
    })
}

pub fn issue_access_token(user: &User, config: &AppConfig) -> Result<String, String> {
    issue_token(
        user,
        TokenType::Access,
        &config.jwt_secret,
        Duration::minutes(config.access_token_ttl_minutes),
    )
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| format!("Invalid {} encoding", what))?;

    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse token {}: {}", what, e);
        format!("Invalid {} format", what)
    })
}

/// Verifies signature, expiry and token type, then returns the identity the
/// token was issued for.
pub fn validate_token(token: &str, jwt_secret: &str, expected: TokenType) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut segments = token.split('.');
    let (header_b64, claims_b64, signature_b64) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err("Invalid token format".to_string()),
        };

    let header: JwtHeader = decode_segment(header_b64, "header")?;
    if header.alg != "HS256" {
        debug!("Rejected token signed with {}", header.alg);
        return Err("Unsupported token algorithm".to_string());
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| "Invalid signature encoding".to_string())?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| "Invalid token signature".to_string())?;

    let claims: JwtClaims = decode_segment(claims_b64, "claims")?;

    let now = Utc::now().timestamp().max(0) as u64;
    if claims.exp < now {
        debug!("Token for {} expired at {}", claims.sub, claims.exp);
        return Err("Token expired".to_string());
    }

    if claims.token_type != expected {
        debug!("Expected {:?} token, got {:?}", expected, claims.token_type);
        return Err("Invalid token type".to_string());
    }

    let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid token subject".to_string())?;

    Ok(User {
        id,
        email: claims.email,
        role: claims.role,
    })
}
