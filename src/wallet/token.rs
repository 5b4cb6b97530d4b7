use base64::engine::general_purpose::URL_SAFE;
use base64::{alphabet, engine::general_purpose, Engine};
use bitcoin::secp256k1::PublicKey;

use crate::amount::Amount;
use crate::script::P2SHScript;
use crate::secret::Secret;

/// Blinded output the wallet submits for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    pub amount: Amount,
    /// blinded curve point `B_ = H2C(secret) + r*G`
    #[serde(rename = "B_")]
    pub b_: PublicKey,
}

/// The mint's promise: a signature on a blinded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedSignature {
    pub amount: Amount,
    /// signed blinded point `C_ = k*B_`
    #[serde(rename = "C_")]
    pub c_: PublicKey,
}

pub type Proofs = Vec<Proof>;
pub type ProofsExtended = Vec<ProofExtended>;

/// A bearer token as it travels: `(secret, C)` is the unblinded verifiable
/// pair. Unknown producer fields are tolerated on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub amount: Amount,
    pub secret: Secret,
    #[serde(rename = "C")]
    pub c: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<P2SHScript>,
}

impl AsRef<Proof> for Proof {
    fn as_ref(&self) -> &Proof {
        self
    }
}

/// Store form: the wire proof plus wallet-local state. The local fields
/// never serialize onto the wire, sends go through [`ProofsSerdeToRaw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofExtended {
    #[serde(flatten)]
    pub raw: Proof,
    /// earmarked for a pending outbound transfer
    #[serde(default)]
    pub reserved: bool,
    /// correlation id shared by the proofs of one send
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_id: Option<String>,
    /// keyset id, when the mint reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl AsRef<Proof> for ProofExtended {
    fn as_ref(&self) -> &Proof {
        &self.raw
    }
}

impl From<Proof> for ProofExtended {
    fn from(raw: Proof) -> Self {
        Self {
            raw,
            reserved: false,
            send_id: None,
            id: None,
        }
    }
}

/// Serialize any pile of proofs down to the raw wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofsSerdeToRaw<'a, T: AsRef<Proof>> {
    pub(crate) raw: &'a [T],
}

impl<'a, T: AsRef<Proof>> serde::Serialize for ProofsSerdeToRaw<'a, T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut state = serializer.serialize_seq(Some(self.raw.len()))?;
        for element in self.raw {
            let p: &Proof = element.as_ref();
            state.serialize_element(p)?;
        }
        state.end()
    }
}

/// helper for piles of proofs
pub trait ProofsHelper: Sized {
    type Proof: AsRef<Proof>;
    fn as_slice(&self) -> &[Self::Proof];
    fn sum(&self) -> Amount {
        self.as_slice().iter().map(|p| p.as_ref().amount).sum()
    }
    fn to_serde_raw(&self) -> ProofsSerdeToRaw<'_, Self::Proof> {
        ProofsSerdeToRaw {
            raw: self.as_slice(),
        }
    }
    fn to_extended(&self) -> ProofsExtended {
        self.as_slice()
            .iter()
            .map(|p| p.as_ref().clone().into())
            .collect()
    }
}

impl ProofsHelper for &[Proof] {
    type Proof = Proof;
    fn as_slice(&self) -> &[Self::Proof] {
        self
    }
}

impl ProofsHelper for Proofs {
    type Proof = Proof;
    fn as_slice(&self) -> &[Self::Proof] {
        &self[..]
    }
}

impl ProofsHelper for &Proofs {
    type Proof = Proof;
    fn as_slice(&self) -> &[Self::Proof] {
        &self[..]
    }
}

impl ProofsHelper for &[ProofExtended] {
    type Proof = ProofExtended;
    fn as_slice(&self) -> &[Self::Proof] {
        self
    }
}

impl ProofsHelper for ProofsExtended {
    type Proof = ProofExtended;
    fn as_slice(&self) -> &[Self::Proof] {
        &self[..]
    }
}

impl ProofsHelper for &ProofsExtended {
    type Proof = ProofExtended;
    fn as_slice(&self) -> &[Self::Proof] {
        &self[..]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0}")]
    Base64(#[from] base64::DecodeError),
    #[error("{0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("proofs required in token")]
    ProofsRequired,
}

/// Transferable bundle: URL-safe base64 over the JSON proof array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token {
    pub proofs: Proofs,
}

impl Token {
    pub fn new(proofs: Proofs) -> Result<Self, TokenError> {
        if proofs.is_empty() {
            return Err(TokenError::ProofsRequired);
        }
        Ok(Self { proofs })
    }

    pub fn amount(&self) -> Amount {
        self.proofs.sum()
    }

    /// Encode for transfer. `hide_secrets` blanks the secrets, yielding a
    /// decoy that shows the amounts but cannot be redeemed.
    pub fn encode(&self, hide_secrets: bool) -> Result<String, TokenError> {
        #[derive(Serialize)]
        struct ProofNoSecret<'a> {
            amount: Amount,
            #[serde(rename = "C")]
            c: &'a PublicKey,
            #[serde(skip_serializing_if = "Option::is_none")]
            script: Option<&'a P2SHScript>,
        }

        let json = if hide_secrets {
            let decoys: Vec<_> = self
                .proofs
                .iter()
                .map(|p| ProofNoSecret {
                    amount: p.amount,
                    c: &p.c,
                    script: p.script.as_ref(),
                })
                .collect();
            serde_json::to_string(&decoys)?
        } else {
            serde_json::to_string(&self.proofs)?
        };

        Ok(URL_SAFE.encode(json))
    }
}

impl std::str::FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decode_config = general_purpose::GeneralPurposeConfig::new()
            .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent);
        let decoded =
            general_purpose::GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?;
        let decoded_str = String::from_utf8(decoded)?;
        let proofs: Proofs = serde_json::from_str(&decoded_str)?;
        Token::new(proofs)
    }
}

use std::fmt;

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.encode(false).map_err(|_| fmt::Error)?;
        write!(f, "{}", encoded)
    }
}
