#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;

/// power-of-two denominations
pub mod amount;

/// blind Diffie-Hellman key exchange
pub mod dhke;

/// output secrets
pub mod secret;

/// pay-to-script-hash spending conditions
pub mod script;

/// single mint wallet
pub mod wallet;

/// durable proof store module
pub mod store;

pub use amount::Amount;
pub use secret::Secret;

use bitcoin::secp256k1::{All, Secp256k1};

lazy_static::lazy_static! {
    /// Process-wide secp256k1 context.
    pub static ref SECP256K1: Secp256k1<All> = Secp256k1::new();
}
