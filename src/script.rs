//! Pay-to-script-hash spending conditions.
//!
//! A lock is a freshly keyed `<pubkey> OP_CHECKSIG` redeem script. The mint
//! stores only the script hash (the address); redeeming a locked proof means
//! presenting the script and a satisfying scriptSig.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use bitcoin::blockdata::opcodes::all::OP_CHECKSIG;
use bitcoin::blockdata::script::{Builder, PushBytesBuf};
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::{Message, SecretKey};
use bitcoin::{Address, Network};

use crate::SECP256K1;

/// Spending condition attached to a proof.
///
/// `script` and `signature` are URL-safe base64 over the raw script bytes;
/// `address` is wallet-local bookkeeping and is not required on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2SHScript {
    pub script: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{0}")]
    Address(#[from] bitcoin::address::Error),
    #[error("{0}")]
    Secp(#[from] bitcoin::secp256k1::Error),
    #[error("script push overflow")]
    PushOverflow,
}

/// Generate a fresh CHECKSIG lock: redeem script, P2SH address and the
/// scriptSig `<sig> <redeem script>` that satisfies it.
pub fn generate_lock() -> Result<P2SHScript, ScriptError> {
    let privkey = SecretKey::new(&mut OsRng);
    let pubkey = bitcoin::PublicKey::new(privkey.public_key(&SECP256K1));

    let redeem_script = Builder::new()
        .push_key(&pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script();
    let address = Address::p2sh(&redeem_script, Network::Bitcoin)?;

    let digest = sha256::Hash::hash(redeem_script.as_bytes());
    let msg = Message::from_slice(digest.as_byte_array())?;
    let mut sig = SECP256K1
        .sign_ecdsa(&msg, &privkey)
        .serialize_der()
        .to_vec();
    // sighash-all marker, as on a transaction-level signature push
    sig.push(0x01);

    let script_sig = Builder::new()
        .push_slice(PushBytesBuf::try_from(sig).map_err(|_| ScriptError::PushOverflow)?)
        .push_slice(
            PushBytesBuf::try_from(redeem_script.to_bytes())
                .map_err(|_| ScriptError::PushOverflow)?,
        )
        .into_script();

    Ok(P2SHScript {
        script: URL_SAFE.encode(redeem_script.as_bytes()),
        signature: URL_SAFE.encode(script_sig.as_bytes()),
        address: Some(address.to_string()),
    })
}
