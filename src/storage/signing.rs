use crate::common::{Result, WatcherError};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// A time-limited link to one stored frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    /// Unix seconds after which the link is refused.
    pub expires: i64,
}

/// Issues and checks HMAC-SHA256 signed frame links.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
    base_url: String,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(key: impl Into<Vec<u8>>, base_url: &str, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
        }
    }

    /// Signer with a fresh random key; links do not survive a restart.
    pub fn random(base_url: &str, ttl: Duration) -> Self {
        let mut key = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key, base_url, ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, camera_id: &str, name: &str, now: i64) -> Result<SignedUrl> {
        let expires = now + self.ttl.as_secs() as i64;
        let signature = hex::encode(self.mac(camera_id, name, expires)?.finalize().into_bytes());

        Ok(SignedUrl {
            url: format!(
                "{}/blob/{}/{}?expires={}&signature={}",
                self.base_url, camera_id, name, expires, signature
            ),
            expires,
        })
    }

    pub fn verify(&self, camera_id: &str, name: &str, expires: i64, signature: &str, now: i64) -> Result<()> {
        let provided = hex::decode(signature).map_err(|_| WatcherError::InvalidSignature)?;
        self.mac(camera_id, name, expires)?
            .verify_slice(&provided)
            .map_err(|_| WatcherError::InvalidSignature)?;

        if now > expires {
            return Err(WatcherError::ExpiredUrl);
        }
        Ok(())
    }

    fn mac(&self, camera_id: &str, name: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| WatcherError::Other(anyhow::anyhow!("Invalid signing key: {}", e)))?;
        mac.update(camera_id.as_bytes());
        mac.update(b"/");
        mac.update(name.as_bytes());
        mac.update(b"/");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn signer() -> UrlSigner {
        UrlSigner::new(b"test-key".to_vec(), "http://watcher.local/", Duration::from_secs(3600))
    }

    fn signature_of(url: &str) -> &str {
        url.split("signature=").nth(1).unwrap()
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let signed = signer().sign("cam-7", "2026-10-19_12-00-05.jpg", NOW).unwrap();
        assert!(signed.url.starts_with("http://watcher.local/blob/cam-7/2026-10-19_12-00-05.jpg?expires="));
        assert_eq!(signed.expires, NOW + 3600);

        let sig = signature_of(&signed.url);
        signer().verify("cam-7", "2026-10-19_12-00-05.jpg", signed.expires, sig, NOW + 3599).unwrap();
        assert!(matches!(
            signer().verify("cam-7", "2026-10-19_12-00-05.jpg", signed.expires, sig, NOW + 3601),
            Err(WatcherError::ExpiredUrl)
        ));
    }

    #[test]
    fn tampering_is_detected() {
        let signed = signer().sign("cam-7", "a.jpg", NOW).unwrap();
        let sig = signature_of(&signed.url);

        for (camera, name, expires) in [("cam-8", "a.jpg", signed.expires), ("cam-7", "b.jpg", signed.expires), ("cam-7", "a.jpg", signed.expires + 60)] {
            assert!(matches!(
                signer().verify(camera, name, expires, sig, NOW),
                Err(WatcherError::InvalidSignature)
            ));
        }
        assert!(matches!(signer().verify("cam-7", "a.jpg", signed.expires, "zz", NOW), Err(WatcherError::InvalidSignature)));
    }

    #[test]
    fn random_signers_do_not_trust_each_other() {
        let a = UrlSigner::random("http://x", Duration::from_secs(60));
        let b = UrlSigner::random("http://x", Duration::from_secs(60));
        let signed = a.sign("cam", "f.jpg", NOW).unwrap();
        assert!(b.verify("cam", "f.jpg", signed.expires, signature_of(&signed.url), NOW).is_err());
    }

    #[test]
    fn non_canonical_hex_is_rejected() {
        // Find a signature whose first byte has a zero high nibble.
        let signed = (0..256)
            .map(|i| signer().sign("cam-7", &format!("{}.jpg", i), NOW).unwrap())
            .find(|s| signature_of(&s.url).starts_with('0'))
            .unwrap();
        let name = signed.url.split('/').nth(5).unwrap().split('?').next().unwrap().to_string();
        let sig = signature_of(&signed.url);
        signer().verify("cam-7", &name, signed.expires, sig, NOW).unwrap();

        let plus = format!("+{}", &sig[1..]);
        assert!(matches!(
            signer().verify("cam-7", &name, signed.expires, &plus, NOW),
            Err(WatcherError::InvalidSignature)
        ));
    }
}
