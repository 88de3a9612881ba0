//! Web-push subscription store and best-effort broadcast dispatcher.
//!
//! Delivery follows RFC 8291/8292: a VAPID ES256 token per endpoint
//! origin and an `aes128gcm`-encrypted payload. A failed delivery prunes
//! the subscription; there are no retries and nothing is surfaced to
//! users.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rusqlite::{params, Connection};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::middleware::AppState;
use crate::models::PushSubscription;

const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;
const PUSH_TTL_SECS: u32 = 24 * 60 * 60;

/// Payload handed to the service worker's `push` event, as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[derive(Serialize)]
struct Claims {
    aud: String,
    sub: String,
    exp: i64,
}

#[derive(Debug, Error)]
enum DeliveryError {
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("endpoint has no host")]
    NoHost,
    #[error("bad subscription keys: {0}")]
    Keys(#[from] base64::DecodeError),
    #[error("payload encryption failed: {0}")]
    Encrypt(#[from] ece::Error),
    #[error("vapid signing failed: {0}")]
    Vapid(#[from] jsonwebtoken::errors::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("push service answered {0}")]
    Status(u16),
}

pub fn subscribe(
    conn: &Connection,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
) -> Result<PushSubscription, AppError> {
    // Re-registering an endpoint refreshes its keys.
    conn.execute(
        "INSERT INTO push_subscriptions (endpoint, p256dh, auth)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth",
        params![endpoint, p256dh, auth],
    )?;

    let query = format!(
        "SELECT {} FROM push_subscriptions WHERE endpoint = ?1",
        PushSubscription::COLUMNS
    );
    let subscription = conn.query_row(&query, params![endpoint], PushSubscription::from_row)?;
    Ok(subscription)
}

pub fn all_subscriptions(conn: &Connection) -> Result<Vec<PushSubscription>, AppError> {
    let query = format!(
        "SELECT {} FROM push_subscriptions ORDER BY id",
        PushSubscription::COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], PushSubscription::from_row)?;
    let subscriptions = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(subscriptions)
}

pub fn delete_subscription(conn: &Connection, id: i64) -> Result<(), AppError> {
    conn.execute("DELETE FROM push_subscriptions WHERE id = ?1", params![id])?;
    Ok(())
}

/// Attempt delivery of `payload` to every stored subscription. Each
/// failure is local to its subscriber: the record is deleted and the pass
/// moves on.
pub async fn broadcast(state: AppState, payload: PushPayload) {
    let Some(private_key) = state.config.vapid_private_key.clone() else {
        debug!("no VAPID private key configured, skipping push broadcast");
        return;
    };

    let subscriptions = {
        let conn = state.pool.lock().unwrap();
        match all_subscriptions(&conn) {
            Ok(subs) => subs,
            Err(err) => {
                warn!("could not load push subscriptions: {}", err);
                return;
            }
        }
    };

    let body = match serde_json::to_string(&payload) {
        Ok(body) => body,
        Err(err) => {
            warn!("could not serialize push payload: {}", err);
            return;
        }
    };

    for subscription in subscriptions {
        let result = deliver(&state, &private_key, &subscription, &body).await;
        if let Err(err) = result {
            warn!(
                "push delivery to {} failed ({}), pruning subscription",
                subscription.endpoint, err
            );
            let conn = state.pool.lock().unwrap();
            if let Err(err) = delete_subscription(&conn, subscription.id) {
                warn!("could not prune subscription {}: {}", subscription.id, err);
            }
        }
    }
}

async fn deliver(
    state: &AppState,
    private_key: &str,
    subscription: &PushSubscription,
    body: &str,
) -> Result<(), DeliveryError> {
    let endpoint = url::Url::parse(&subscription.endpoint)?;
    let host = endpoint.host_str().ok_or(DeliveryError::NoHost)?;
    let aud = format!("{}://{}", endpoint.scheme(), host);

    let claims = Claims {
        aud,
        sub: state.config.vapid_subject.clone(),
        exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    let key = EncodingKey::from_ec_pem(private_key.as_bytes())?;
    let token = encode(&Header::new(Algorithm::ES256), &claims, &key)?;

    let p256dh = BASE64_URL.decode(&subscription.p256dh)?;
    let auth = BASE64_URL.decode(&subscription.auth)?;
    let data = ece::encrypt(&p256dh, &auth, body.as_bytes())?;

    let mut request = state
        .http
        .post(&subscription.endpoint)
        .header("Authorization", format!("WebPush {}", token))
        .header("Content-Encoding", "aes128gcm")
        .header("TTL", PUSH_TTL_SECS.to_string())
        .body(data);

    if let Some(public_key) = &state.config.vapid_public_key {
        request = request.header("Crypto-Key", format!("p256ecdsa={}", public_key.trim()));
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DeliveryError::Status(status.as_u16()));
    }

    debug!("pushed to {}", subscription.endpoint);
    Ok(())
}
