use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::rand::RngCore;

/// Marker for secrets that carry a pay-to-script-hash condition.
pub const P2SH_MARKER: &str = "P2SH:";

/// The secret data that allows spending ecash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    const BIT_LENGTH: usize = 128;

    /// 128 bits of randomness, URL-safe base64.
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; Self::BIT_LENGTH / 8];
        OsRng.fill_bytes(&mut random_bytes);
        Self(URL_SAFE.encode(random_bytes))
    }

    /// Derive `n` secrets from a shared base.
    ///
    /// A base carrying the P2SH marker keeps every derived secret under the
    /// same lock but with an unlinkable random tail. Any other base expands
    /// deterministically as `<i>:<base>` so the other side can re-derive the
    /// series.
    pub fn expand(base: &str, n: usize) -> Vec<Self> {
        if base.split(P2SH_MARKER).count() == 2 {
            (0..n)
                .map(|_| Self(format!("{}:{}", base, Self::generate())))
                .collect()
        } else {
            (0..n).map(|i| Self(format!("{}:{}", i, base))).collect()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

use std::fmt;
impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
