use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies HMAC-SHA256 signatures on inbound Replicate webhooks.
///
/// The signed content is `"{webhook_id}.{timestamp}.{payload}"`, keyed with
/// the base64-decoded secret (the `whsec_` prefix is not part of the key).
/// Verification fails closed: a missing secret, an unparseable timestamp or a
/// timestamp outside the replay window all reject the delivery.
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify a webhook delivery against the current wall clock.
    pub fn verify(
        &self,
        payload: &str,
        webhook_id: &str,
        webhook_timestamp: &str,
        signature_header: &str,
    ) -> bool {
        self.verify_at(
            Utc::now().timestamp(),
            payload,
            webhook_id,
            webhook_timestamp,
            signature_header,
        )
    }

    /// Verify a webhook delivery as of `now_unix` seconds.
    pub fn verify_at(
        &self,
        now_unix: i64,
        payload: &str,
        webhook_id: &str,
        webhook_timestamp: &str,
        signature_header: &str,
    ) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            tracing::warn!("Webhook secret not configured; rejecting delivery");
            return false;
        };

        let Ok(sent_at) = webhook_timestamp.parse::<i64>() else {
            return false;
        };
        // checked_sub: the header is attacker-controlled and may parse to an
        // i64 extreme; an unrepresentable skew is simply out of window.
        let Some(skew_secs) = now_unix.checked_sub(sent_at).map(i64::unsigned_abs) else {
            return false;
        };
        if skew_secs > self.tolerance_secs.unsigned_abs() {
            tracing::warn!(skew_secs, "Webhook timestamp outside replay window");
            return false;
        }

        let key_b64 = secret.strip_prefix("whsec_").unwrap_or(secret);
        let Ok(key) = base64::engine::general_purpose::STANDARD.decode(key_b64) else {
            tracing::warn!("Webhook secret is not valid base64");
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
            return false;
        };
        mac.update(format!("{webhook_id}.{webhook_timestamp}.{payload}").as_bytes());
        let expected =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        // The header may carry several "version,signature" tokens so the
        // provider can rotate secrets; any match passes.
        signature_header.split_whitespace().any(|token| {
            let candidate = token.split_once(',').map(|(_, sig)| sig).unwrap_or(token);
            constant_time_eq(expected.as_bytes(), candidate.as_bytes())
        })
    }
}

/// Byte-wise comparison that does not short-circuit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
