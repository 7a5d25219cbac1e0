// core/src/signature.rs

//! Verification of gateway payment callbacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("Gateway signing secret must not be empty")]
pub struct EmptySecret;

/// Holds the gateway's shared secret and checks callback signatures.
///
/// The expected signature is the lowercase hex of
/// `HMAC-SHA256(secret, gateway_order_id + "|" + gateway_payment_id)`.
#[derive(Clone)]
pub struct SignatureVerifier {
  keyed: HmacSha256,
}

impl SignatureVerifier {
  pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, EmptySecret> {
    let secret = secret.as_ref();
    if secret.is_empty() {
      return Err(EmptySecret);
    }
    // HMAC accepts keys of any length; the only failure mode is handled above.
    let keyed = HmacSha256::new_from_slice(secret).map_err(|_| EmptySecret)?;
    Ok(Self { keyed })
  }

  fn mac_for(&self, gateway_order_id: &str, gateway_payment_id: &str) -> HmacSha256 {
    let mut mac = self.keyed.clone();
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    mac
  }

  /// Produces the signature the gateway would send. Used by mock gateways and tests.
  pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    hex::encode(self.mac_for(gateway_order_id, gateway_payment_id).finalize().into_bytes())
  }

  /// Constant-time comparison against `client_signature` (hex, case-insensitive).
  pub fn verify(&self, gateway_order_id: &str, gateway_payment_id: &str, client_signature: &str) -> bool {
    let Ok(provided) = hex::decode(client_signature.trim()) else {
      return false;
    };
    self
      .mac_for(gateway_order_id, gateway_payment_id)
      .verify_slice(&provided)
      .is_ok()
  }
}

impl std::fmt::Debug for SignatureVerifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SignatureVerifier").field("secret", &"[REDACTED]").finish()
  }
}
