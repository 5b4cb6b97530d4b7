use std::error::Error as StdError;

pub use crate::script::P2SHScript;
pub use crate::wallet::{Proof, ProofExtended, Proofs, ProofsExtended};

pub mod impl_redb;

/// Durable wallet store. The wallet keeps an in-memory mirror; reloads are
/// full reads and every mutation goes through here first.
#[async_trait]
pub trait ProofStore {
    type Error: StdError + Send + Sync;

    /// Insert or replace by secret. Idempotent.
    async fn store_proof(&self, proof: &ProofExtended) -> Result<(), Self::Error>;
    /// All live (non-invalidated) proofs.
    async fn get_proofs(&self) -> Result<ProofsExtended, Self::Error>;
    /// Drop from the live set; the secret stays known as used.
    async fn invalidate_proof(&self, proof: &Proof) -> Result<(), Self::Error>;
    /// Secret present in the live set or the spent history.
    async fn secret_used(&self, secret: &str) -> Result<bool, Self::Error>;
    /// Stamp the reserved flag and send correlation id on a live proof.
    async fn update_proof_reserved(
        &self,
        proof: &Proof,
        reserved: bool,
        send_id: Option<&str>,
    ) -> Result<(), Self::Error>;
    /// Persist a generated lock for later lookup.
    async fn store_p2sh(&self, script: &P2SHScript) -> Result<(), Self::Error>;
    /// Look up a persisted lock by address.
    async fn get_p2sh(&self, address: &str) -> Result<Option<P2SHScript>, Self::Error>;
}

use std::sync::Arc;

#[async_trait]
impl<T> ProofStore for Arc<T>
where
    T: ProofStore + Sync + Send,
{
    type Error = T::Error;

    async fn store_proof(&self, proof: &ProofExtended) -> Result<(), Self::Error> {
        self.as_ref().store_proof(proof).await
    }
    async fn get_proofs(&self) -> Result<ProofsExtended, Self::Error> {
        self.as_ref().get_proofs().await
    }
    async fn invalidate_proof(&self, proof: &Proof) -> Result<(), Self::Error> {
        self.as_ref().invalidate_proof(proof).await
    }
    async fn secret_used(&self, secret: &str) -> Result<bool, Self::Error> {
        self.as_ref().secret_used(secret).await
    }
    async fn update_proof_reserved(
        &self,
        proof: &Proof,
        reserved: bool,
        send_id: Option<&str>,
    ) -> Result<(), Self::Error> {
        self.as_ref()
            .update_proof_reserved(proof, reserved, send_id)
            .await
    }
    async fn store_p2sh(&self, script: &P2SHScript) -> Result<(), Self::Error> {
        self.as_ref().store_p2sh(script).await
    }
    async fn get_p2sh(&self, address: &str) -> Result<Option<P2SHScript>, Self::Error> {
        self.as_ref().get_p2sh(address).await
    }
}
