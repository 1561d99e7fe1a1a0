use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    MalformedPayload,
    StaleTimestamp,
    Mismatch,
}

impl SignatureError {
    pub fn reason(&self) -> &'static str {
        match self {
            SignatureError::MalformedPayload => "malformed_payload",
            SignatureError::StaleTimestamp => "stale_timestamp",
            SignatureError::Mismatch => "signature_mismatch",
        }
    }
}

/// HMAC-SHA256 gate for one trust boundary. Each boundary gets its own
/// secret, so a signature valid for one never verifies against another.
///
/// The signed string is `"{timestamp}.{canonical_payload}"`. Authentication
/// happens strictly before any ledger write; a failed check performs zero
/// mutations.
#[derive(Clone)]
pub struct SignatureGate {
    secret: Vec<u8>,
    replay_window_secs: i64,
}

impl SignatureGate {
    pub fn new(secret: &str, replay_window_secs: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            replay_window_secs,
        }
    }

    /// Stable-key-order, no-whitespace rendering of a JSON body. serde_json
    /// object maps are BTreeMaps here (no `preserve_order`), so re-serializing
    /// yields sorted keys.
    pub fn canonicalize(raw: &str) -> Result<String, SignatureError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| SignatureError::MalformedPayload)?;
        serde_json::to_string(&value).map_err(|_| SignatureError::MalformedPayload)
    }

    pub fn sign(&self, timestamp: i64, canonical_payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}.{}", timestamp, canonical_payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verifies `signature_hex` over the canonicalized body, then rejects
    /// timestamps outside the replay window even when the MAC matches.
    pub fn verify(
        &self,
        raw_body: &str,
        signature_hex: &str,
        timestamp: i64,
    ) -> Result<(), SignatureError> {
        let canonical = Self::canonicalize(raw_body)?;
        let expected = self.sign(timestamp, &canonical);

        let provided = hex::decode(signature_hex).map_err(|_| SignatureError::Mismatch)?;
        let expected_bytes = hex::decode(&expected).expect("own hex output decodes");
        let matches: bool = provided.ct_eq(&expected_bytes).into();
        if !matches {
            return Err(SignatureError::Mismatch);
        }

        let skew = (Utc::now().timestamp() - timestamp).abs();
        if skew > self.replay_window_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SignatureGate {
        SignatureGate::new("chat-secret", 300)
    }

    fn signed(gate: &SignatureGate, body: &str) -> (i64, String) {
        let ts = Utc::now().timestamp();
        let canonical = SignatureGate::canonicalize(body).unwrap();
        (ts, gate.sign(ts, &canonical))
    }

    #[test]
    fn accepts_valid_signature() {
        let gate = gate();
        let body = r#"{"from":"+15550001","text":"hello"}"#;
        let (ts, sig) = signed(&gate, body);
        assert!(gate.verify(body, &sig, ts).is_ok());
    }

    #[test]
    fn canonical_form_ignores_key_order() {
        let a = SignatureGate::canonicalize(r#"{"b":1,"a":2}"#).unwrap();
        let b = SignatureGate::canonicalize(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn rejects_tampered_body() {
        let gate = gate();
        let (ts, sig) = signed(&gate, r#"{"text":"hello"}"#);
        assert_eq!(
            gate.verify(r#"{"text":"goodbye"}"#, &sig, ts),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp_even_with_valid_mac() {
        let gate = gate();
        let body = r#"{"text":"hello"}"#;
        let ts = Utc::now().timestamp() - 301;
        let canonical = SignatureGate::canonicalize(body).unwrap();
        let sig = gate.sign(ts, &canonical);
        assert_eq!(
            gate.verify(body, &sig, ts),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_signature_from_other_boundary() {
        let chat = SignatureGate::new("chat-secret", 300);
        let voice = SignatureGate::new("voice-secret", 300);
        let body = r#"{"text":"hello"}"#;
        let (ts, sig) = signed(&chat, body);
        assert_eq!(
            voice.verify(body, &sig, ts),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_non_hex_signature() {
        let gate = gate();
        let ts = Utc::now().timestamp();
        assert_eq!(
            gate.verify(r#"{"text":"x"}"#, "not-hex", ts),
            Err(SignatureError::Mismatch)
        );
    }
}
