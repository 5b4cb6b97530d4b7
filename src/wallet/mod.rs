use std::collections::HashSet;
use std::error::Error as StdError;

use bitcoin::secp256k1::SecretKey;
use uuid::Uuid;

use crate::amount::Amount;
use crate::dhke::{self, CryptoError};
use crate::script::{self, P2SHScript};
use crate::secret::Secret;
use crate::store::ProofStore;

mod client;
mod error;
mod token;

pub use client::*;
pub use error::*;
pub use token::*;

use error::WalletError as Error;

/// One planned output, carried as a unit through the pipeline so amount,
/// secret and blinding factor can never drift out of step.
#[derive(Debug, Clone)]
pub struct PreMint {
    pub blinded_message: BlindedMessage,
    pub secret: Secret,
    pub r: SecretKey,
    pub amount: Amount,
}

/// Planned outputs for one mint or split call, in submission order.
#[derive(Debug, Clone, Default)]
pub struct PreMintSecrets {
    pub secrets: Vec<PreMint>,
}

impl PreMintSecrets {
    /// Outputs for `amount` with fresh random secrets.
    pub fn random(amount: Amount) -> Result<Self, CryptoError> {
        let amounts = amount.split();
        let secrets = (0..amounts.len()).map(|_| Secret::generate()).collect();
        Self::with_secrets(&amounts, secrets)
    }

    /// Outputs from pre-defined secrets, positionally matched to `amounts`.
    pub fn with_secrets(amounts: &[Amount], secrets: Vec<Secret>) -> Result<Self, CryptoError> {
        let mut output = Vec::with_capacity(secrets.len());

        for (secret, amount) in secrets.into_iter().zip(amounts.iter().copied()) {
            let (b_, r) = dhke::blind_message(secret.as_bytes(), None)?;

            output.push(PreMint {
                blinded_message: BlindedMessage { amount, b_ },
                secret,
                r,
                amount,
            });
        }

        Ok(Self { secrets: output })
    }

    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets.iter().map(|p| p.blinded_message.clone()).collect()
    }

    pub fn secrets(&self) -> impl Iterator<Item = &Secret> {
        self.secrets.iter().map(|p| &p.secret)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Outputs for a split: the keep pile first, then the send pile. The mint
/// answers `fst` for everything before `send_idx_start` and `snd` for the
/// rest, so the index must survive the call unchanged.
#[derive(Debug, Clone, Default)]
pub struct PreMintSplit {
    pub messages: PreMintSecrets,
    send_idx_start: usize,
}

impl PreMintSplit {
    pub fn new(messages: PreMintSecrets, send_idx_start: usize) -> Self {
        assert!(send_idx_start <= messages.len());

        Self {
            messages,
            send_idx_start,
        }
    }

    pub fn send_idx_start(&self) -> usize {
        self.send_idx_start
    }

    /// Plan outputs for keeping `keep` and sending `send`.
    ///
    /// Without a base secret every output gets a fresh random one. With a
    /// base, the send pile derives its secrets from it (see
    /// [`Secret::expand`]) while the keep pile stays random.
    pub fn plan(keep: Amount, send: Amount, send_secret: Option<&str>) -> Result<Self, CryptoError> {
        let keep_amounts = keep.split();
        let send_amounts = send.split();

        let mut secrets: Vec<Secret> = (0..keep_amounts.len())
            .map(|_| Secret::generate())
            .collect();
        match send_secret {
            Some(base) => secrets.extend(Secret::expand(base, send_amounts.len())),
            None => secrets.extend((0..send_amounts.len()).map(|_| Secret::generate())),
        }

        let amounts: Vec<Amount> = keep_amounts
            .iter()
            .chain(send_amounts.iter())
            .copied()
            .collect();
        let messages = PreMintSecrets::with_secrets(&amounts, secrets)?;

        Ok(Self::new(messages, keep_amounts.len()))
    }
}

/// Result of a split, cut into the keep and send piles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitProofs {
    proofs: Proofs,
    send_idx_start: usize,
}

impl SplitProofs {
    pub fn new(proofs: Proofs, send_idx_start: usize) -> Self {
        assert!(send_idx_start <= proofs.len());

        Self {
            proofs,
            send_idx_start,
        }
    }

    pub fn keep(&self) -> &[Proof] {
        &self.proofs[..self.send_idx_start]
    }

    pub fn send(&self) -> &[Proof] {
        &self.proofs[self.send_idx_start..]
    }

    pub fn all(&self) -> &[Proof] {
        &self.proofs
    }

    pub fn into_inner(self) -> (Proofs, usize) {
        (self.proofs, self.send_idx_start)
    }
}

/// Unblind a batch of promises into proofs, positionally matched against the
/// planned outputs.
pub fn construct_proofs<E: StdError>(
    promises: Vec<BlindedSignature>,
    pre_mints: &[PreMint],
    keys: &MintKeyset,
) -> Result<Proofs, Error<E>> {
    if promises.len() != pre_mints.len() {
        return Err(Error::Custom(format_err!(
            "promises size unexpected: promises {}, outputs {}",
            promises.len(),
            pre_mints.len(),
        )));
    }

    let mut proofs = Vec::with_capacity(promises.len());

    for (promise, pre) in promises.into_iter().zip(pre_mints.iter()) {
        let key = keys.amount_key(promise.amount).ok_or_else(|| {
            Error::Custom(format_err!("not found amount key: {}", promise.amount))
        })?;

        let c = dhke::unblind_message(&promise.c_, &pre.r, key)?;

        proofs.push(Proof {
            amount: promise.amount,
            secret: pre.secret.clone(),
            c,
            script: None,
        });
    }

    Ok(proofs)
}

/// Single-mint wallet: drives the mint protocol with outputs built from the
/// crypto pipeline and keeps the proof store and an in-memory mirror in
/// lockstep.
///
/// Mutating operations take `&mut self`; concurrent calls against one
/// instance are not supported. Callers multiplexing UI actions should wrap
/// the wallet in a `tokio::sync::Mutex`.
pub struct Wallet<S: ProofStore> {
    client: MintClient,
    keys: MintKeyset,
    store: S,
    proofs: ProofsExtended,
}

impl<S> Wallet<S>
where
    S: ProofStore,
{
    /// Connect to the mint and load its keyset plus the stored proofs.
    /// A preloaded keyset skips the fetch.
    pub async fn new(
        client: MintClient,
        keyset: Option<MintKeyset>,
        store: S,
    ) -> Result<Self, Error<S::Error>> {
        let keys = match keyset {
            Some(keys) => keys,
            None => client.get_keys().await?,
        };
        if keys.is_empty() {
            return Err(Error::Config("did not receive keys from mint"));
        }

        let mut this = Self {
            client,
            keys,
            store,
            proofs: vec![],
        };
        this.load_proofs().await?;

        Ok(this)
    }

    /// Refetch the mint keyset.
    pub async fn load_mint(&mut self) -> Result<(), Error<S::Error>> {
        let keys = self.client.get_keys().await?;
        if keys.is_empty() {
            return Err(Error::Config("did not receive keys from mint"));
        }

        self.keys = keys;
        Ok(())
    }

    /// Replace the in-memory mirror with a full store read.
    pub async fn load_proofs(&mut self) -> Result<(), Error<S::Error>> {
        self.proofs = self.store.get_proofs().await.map_err(Error::Store)?;
        Ok(())
    }

    pub fn client(&self) -> &MintClient {
        &self.client
    }

    pub fn keys(&self) -> &MintKeyset {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn proofs(&self) -> &ProofsExtended {
        &self.proofs
    }

    /// Sum over all stored proofs, reserved ones included.
    pub fn balance(&self) -> Amount {
        self.proofs.sum()
    }

    /// Sum over the proofs not earmarked for a pending send.
    pub fn available_balance(&self) -> Amount {
        self.proofs
            .iter()
            .filter(|p| !p.reserved)
            .map(|p| p.raw.amount)
            .sum()
    }

    /// Denominations held, ascending.
    pub fn proof_amounts(&self) -> Vec<Amount> {
        let mut amounts: Vec<Amount> = self.proofs.iter().map(|p| p.raw.amount).collect();
        amounts.sort();
        amounts
    }

    /// Ask the mint for a Lightning invoice covering `amount`.
    pub async fn request_mint(&self, amount: Amount) -> Result<serde_json::Value, Error<S::Error>> {
        Ok(self.client.request_mint(amount).await?)
    }

    /// Fee the mint would charge for paying `invoice`.
    pub async fn check_fees(&self, invoice: &str) -> Result<u64, Error<S::Error>> {
        Ok(self.client.check_fees(invoice).await?.fee)
    }

    /// Which of `proofs` does the mint still consider spendable.
    pub async fn check_spendable(
        &self,
        proofs: impl ProofsHelper,
    ) -> Result<CheckResponse, Error<S::Error>> {
        Ok(self.client.check(proofs).await?)
    }

    /// Mint new proofs once the invoice behind `payment_hash` is paid.
    pub async fn mint(
        &mut self,
        amount: Amount,
        payment_hash: Option<&str>,
    ) -> Result<Proofs, Error<S::Error>> {
        let outputs = PreMintSecrets::random(amount)?;
        self.check_used_secrets(outputs.secrets()).await?;

        let promises = self
            .client
            .mint(&outputs.blinded_messages(), payment_hash)
            .await?;

        let proofs = construct_proofs(promises, &outputs.secrets, &self.keys)?;
        if proofs.is_empty() {
            return Err(Error::EmptyProofs);
        }

        self.store_new_proofs(&proofs).await?;

        Ok(proofs)
    }

    /// Consume `proofs` and mint a keep pile of `total - amount` and a send
    /// pile of `amount`, rotating every secret.
    ///
    /// With a `send_secret`, the send pile derives its secrets from it to
    /// attach a pre-agreed spending condition.
    pub async fn split(
        &mut self,
        proofs: Proofs,
        amount: Amount,
        send_secret: Option<&str>,
    ) -> Result<SplitProofs, Error<S::Error>> {
        if proofs.is_empty() {
            return Err(Error::EmptyProofs);
        }

        let total = proofs.sum();
        let keep = total
            .checked_sub(amount)
            .ok_or_else(Error::insufficient_funds)?;

        let outputs = PreMintSplit::plan(keep, amount, send_secret)?;
        self.check_used_secrets(outputs.messages.secrets()).await?;

        let resp = self
            .client
            .split(&proofs, amount, &outputs.messages.blinded_messages())
            .await?;
        if resp.fst.is_empty() && resp.snd.is_empty() {
            return Err(Error::EmptyProofs);
        }

        // fst answers the keep outputs, snd the send outputs
        let boundary = outputs.send_idx_start();
        if resp.fst.len() != boundary || resp.snd.len() != outputs.messages.len() - boundary {
            return Err(Error::Custom(format_err!(
                "split response size unexpected: fst {}, snd {}, planned {}/{}",
                resp.fst.len(),
                resp.snd.len(),
                boundary,
                outputs.messages.len() - boundary,
            )));
        }

        let keep_proofs =
            construct_proofs(resp.fst, &outputs.messages.secrets[..boundary], &self.keys)?;
        let mut new_proofs = keep_proofs;
        let send_idx_start = new_proofs.len();
        let send_proofs =
            construct_proofs(resp.snd, &outputs.messages.secrets[boundary..], &self.keys)?;
        new_proofs.extend(send_proofs);

        // new pile first, inputs after: a crash in between leaves value
        // recoverable through load_proofs + invalidate
        self.store_new_proofs(&new_proofs).await?;
        self.remove_spent(&proofs).await?;

        Ok(SplitProofs::new(new_proofs, send_idx_start))
    }

    /// Receive foreign proofs by splitting them for their full value, which
    /// rotates the secrets under this wallet's control. P2SH-locked inputs
    /// carry their unlock script and signature into the call.
    pub async fn redeem(
        &mut self,
        mut proofs: Proofs,
        script: Option<String>,
        signature: Option<String>,
    ) -> Result<SplitProofs, Error<S::Error>> {
        match (script, signature) {
            (Some(script), Some(signature)) => {
                debug!("unlock script: {}", script);
                for p in &mut proofs {
                    p.script = Some(P2SHScript {
                        script: script.clone(),
                        signature: signature.clone(),
                        address: None,
                    });
                }
            }
            (None, None) => {}
            _ => return Err(Error::IncompleteScript),
        }

        let total = proofs.sum();
        self.split(proofs, total, None).await
    }

    /// Like [`split`](Self::split), but only spends proofs not reserved for
    /// another send.
    pub async fn split_to_send(
        &mut self,
        proofs: &[ProofExtended],
        amount: Amount,
        send_secret: Option<&str>,
    ) -> Result<SplitProofs, Error<S::Error>> {
        let spendable: Proofs = proofs
            .iter()
            .filter(|p| !p.reserved)
            .map(|p| p.raw.clone())
            .collect();

        if spendable.is_empty() || spendable.sum() < amount {
            return Err(Error::insufficient_funds());
        }

        self.split(spendable, amount, send_secret).await
    }

    /// Pay a Lightning invoice by melting `proofs`. Consumed proofs are
    /// invalidated on success; an unpaid melt leaves them untouched.
    pub async fn pay_lightning(
        &mut self,
        proofs: Proofs,
        invoice: &str,
    ) -> Result<MeltResponse, Error<S::Error>> {
        let status = self.client.melt(&proofs, invoice).await?;

        if !status.paid {
            return Err(Error::PaymentFailed);
        }

        self.remove_spent(&proofs).await?;

        Ok(status)
    }

    /// Reconcile with the mint: drop every input `/check` reports as no
    /// longer spendable. Inputs the mint still honors are left untouched;
    /// this prunes, it does not spend.
    pub async fn invalidate(&mut self, proofs: &[Proof]) -> Result<Proofs, Error<S::Error>> {
        let spendable = self.client.check(proofs).await?;

        let mut invalidated = vec![];
        for (idx, ok) in spendable {
            if ok {
                continue;
            }
            if let Some(p) = proofs.get(idx as usize) {
                self.store
                    .invalidate_proof(p)
                    .await
                    .map_err(Error::Store)?;
                invalidated.push(p.clone());
            }
        }

        let gone: HashSet<&str> = invalidated.iter().map(|p| p.secret.as_str()).collect();
        self.proofs
            .retain(|p| !gone.contains(p.raw.secret.as_str()));

        Ok(invalidated)
    }

    /// Stamp a batch with the reserved flag and one fresh send id. Reserved
    /// proofs keep counting toward `balance` but leave `available_balance`.
    pub async fn set_reserved(
        &mut self,
        proofs: &[Proof],
        reserved: bool,
    ) -> Result<String, Error<S::Error>> {
        let send_id = Uuid::new_v4().to_string();
        let targets: HashSet<&str> = proofs.iter().map(|p| p.secret.as_str()).collect();

        for p in self
            .proofs
            .iter_mut()
            .filter(|p| targets.contains(p.raw.secret.as_str()))
        {
            p.reserved = reserved;
            p.send_id = reserved.then(|| send_id.clone());

            self.store
                .update_proof_reserved(&p.raw, reserved, reserved.then_some(send_id.as_str()))
                .await
                .map_err(Error::Store)?;
        }

        Ok(send_id)
    }

    /// Generate and persist a fresh P2SH lock.
    pub async fn create_p2sh_lock(&self) -> Result<P2SHScript, Error<S::Error>> {
        let lock = script::generate_lock()?;

        self.store.store_p2sh(&lock).await.map_err(Error::Store)?;

        Ok(lock)
    }

    /// Serialize proofs for offline transfer.
    pub fn serialize_proofs(
        &self,
        proofs: Proofs,
        hide_secrets: bool,
    ) -> Result<String, Error<S::Error>> {
        Ok(Token::new(proofs)?.encode(hide_secrets)?)
    }

    async fn check_used_secrets<'a>(
        &self,
        secrets: impl Iterator<Item = &'a Secret>,
    ) -> Result<(), Error<S::Error>> {
        for s in secrets {
            if self
                .store
                .secret_used(s.as_str())
                .await
                .map_err(Error::Store)?
            {
                return Err(Error::SecretReused(s.as_str().to_owned()));
            }
        }

        Ok(())
    }

    async fn store_new_proofs(&mut self, proofs: &Proofs) -> Result<(), Error<S::Error>> {
        for p in proofs {
            let p = ProofExtended::from(p.clone());
            self.store.store_proof(&p).await.map_err(Error::Store)?;
            self.proofs.push(p);
        }

        Ok(())
    }

    async fn remove_spent(&mut self, proofs: &Proofs) -> Result<(), Error<S::Error>> {
        {
            let used: HashSet<&str> = proofs.iter().map(|p| p.secret.as_str()).collect();
            self.proofs
                .retain(|p| !used.contains(p.raw.secret.as_str()));
        }

        for p in proofs {
            self.store
                .invalidate_proof(p)
                .await
                .map_err(Error::Store)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use bitcoin::secp256k1::SecretKey;

    use super::*;
    use crate::store::impl_redb::{Redb, StoreError};
    use crate::store::tests::{mint_key, random_proofs, tmpfi};
    use crate::SECP256K1;

    fn mock_keyset(k: &SecretKey) -> MintKeyset {
        (0..32)
            .map(|bit| (Amount::from(1u64 << bit), k.public_key(&SECP256K1)))
            .collect()
    }

    fn mock_sign(k: &SecretKey, outputs: &[BlindedMessage]) -> Vec<BlindedSignature> {
        outputs
            .iter()
            .map(|o| BlindedSignature {
                amount: o.amount,
                c_: dhke::sign_message(k, &o.b_).unwrap(),
            })
            .collect()
    }

    /// Wallet over a throwaway store; the client URL points nowhere, tests
    /// here never leave the process.
    async fn new_wallet(amounts: &[u64]) -> (tempfile::TempDir, Wallet<Arc<Redb>>) {
        let (td, tf) = tmpfi("wallet.redb");
        let db = Redb::open(tf, Default::default()).unwrap();

        for p in random_proofs(amounts) {
            db.store_proof(&p).await.unwrap();
        }

        let client = MintClient::new(
            "http://127.0.0.1:3338".parse().unwrap(),
            HttpOptions::new().timeout_connect_ms(100),
        )
        .unwrap();

        let wallet = Wallet::new(client, Some(mock_keyset(&mint_key(5))), db)
            .await
            .unwrap();

        (td, wallet)
    }

    #[test]
    fn test_mint_outputs() {
        // minting 3 submits blinded messages for 1 and 2
        let outputs = PreMintSecrets::random(3.into()).unwrap();
        assert_eq!(outputs.len(), 2);

        let messages = outputs.blinded_messages();
        assert_eq!(messages[0].amount, 1.into());
        assert_eq!(messages[1].amount, 2.into());
    }

    #[test]
    fn test_mint_pipeline_roundtrip() {
        let k = mint_key(5);
        let keys = mock_keyset(&k);

        let outputs = PreMintSecrets::random(3.into()).unwrap();
        let promises = mock_sign(&k, &outputs.blinded_messages());
        assert_eq!(promises.len(), 2);

        let proofs: Proofs =
            construct_proofs::<StoreError>(promises, &outputs.secrets, &keys).unwrap();

        assert_eq!(proofs.sum(), 3.into());
        for (proof, pre) in proofs.iter().zip(&outputs.secrets) {
            assert_eq!(proof.secret, pre.secret);
            // C = k*H2C(secret)
            assert!(dhke::verify_message(&k, &proof.c, proof.secret.as_bytes()).unwrap());
        }
    }

    #[test]
    fn test_construct_proofs_size_mismatch() {
        let k = mint_key(5);
        let keys = mock_keyset(&k);

        let outputs = PreMintSecrets::random(3.into()).unwrap();
        let mut promises = mock_sign(&k, &outputs.blinded_messages());
        promises.pop();

        let got = construct_proofs::<StoreError>(promises, &outputs.secrets, &keys);
        assert!(matches!(got, Err(Error::Custom(_))));
    }

    #[test]
    fn test_split_plan_ordering() {
        // keep 8, send 5: outputs are [8] ++ [1, 4]
        let outputs = PreMintSplit::plan(8.into(), 5.into(), None).unwrap();
        assert_eq!(outputs.send_idx_start(), 1);

        let amounts: Vec<Amount> = outputs.messages.secrets.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![8.into(), 1.into(), 4.into()]);
    }

    #[test]
    fn test_split_conservation() {
        let k = mint_key(5);
        let keys = mock_keyset(&k);

        for (total, amount) in [(13u64, 5u64), (13, 0), (13, 13), (255, 64), (7, 6)] {
            let keep = total - amount;
            let outputs = PreMintSplit::plan(keep.into(), amount.into(), None).unwrap();

            let boundary = outputs.send_idx_start();
            assert_eq!(boundary, keep.count_ones() as usize);
            assert_eq!(
                outputs.messages.len() - boundary,
                amount.count_ones() as usize
            );

            let promises = mock_sign(&k, &outputs.messages.blinded_messages());
            let keep_proofs = construct_proofs::<StoreError>(
                promises[..boundary].to_vec(),
                &outputs.messages.secrets[..boundary],
                &keys,
            )
            .unwrap();
            let send_proofs = construct_proofs::<StoreError>(
                promises[boundary..].to_vec(),
                &outputs.messages.secrets[boundary..],
                &keys,
            )
            .unwrap();

            assert_eq!(keep_proofs.sum(), keep.into());
            assert_eq!(send_proofs.sum(), amount.into());
            for p in keep_proofs.iter().chain(send_proofs.iter()) {
                assert!(p.amount.to_u64().is_power_of_two());
            }
        }
    }

    #[test]
    fn test_split_plan_send_secret() {
        let outputs = PreMintSplit::plan(8.into(), 5.into(), Some("base")).unwrap();

        let secrets: Vec<&str> = outputs
            .messages
            .secrets()
            .map(|s| s.as_str())
            .collect();
        // keep secret is random, send secrets derive from the base
        assert_eq!(secrets.len(), 3);
        assert_eq!(secrets[1], "0:base");
        assert_eq!(secrets[2], "1:base");
        assert_ne!(secrets[0], "0:base");
    }

    #[tokio::test]
    async fn test_split_store_lifecycle() {
        // proofs {8, 4, 1} split for 5: keep [8], send [1, 4]
        let (_td, mut wallet) = new_wallet(&[13]).await;
        assert_eq!(wallet.balance(), 13.into());

        let inputs: Proofs = wallet.proofs().iter().map(|p| p.raw.clone()).collect();
        let old_secrets: Vec<String> = inputs
            .iter()
            .map(|p| p.secret.as_str().to_owned())
            .collect();

        let k = mint_key(5);
        let outputs = PreMintSplit::plan(8.into(), 5.into(), None).unwrap();
        let boundary = outputs.send_idx_start();
        let promises = mock_sign(&k, &outputs.messages.blinded_messages());

        let mut new_proofs = construct_proofs::<StoreError>(
            promises[..boundary].to_vec(),
            &outputs.messages.secrets[..boundary],
            wallet.keys(),
        )
        .unwrap();
        new_proofs.extend(
            construct_proofs::<StoreError>(
                promises[boundary..].to_vec(),
                &outputs.messages.secrets[boundary..],
                wallet.keys(),
            )
            .unwrap(),
        );

        wallet.store_new_proofs(&new_proofs).await.unwrap();
        wallet.remove_spent(&inputs).await.unwrap();

        let split = SplitProofs::new(new_proofs, boundary);
        assert_eq!(split.keep().sum(), 8.into());
        assert_eq!(split.send().sum(), 5.into());
        assert_eq!(wallet.balance(), 13.into());

        // the consumed inputs are gone from the store but their secrets
        // stay known
        let stored = wallet.store().get_proofs().await.unwrap();
        assert_eq!(stored.sum(), 13.into());
        for s in &old_secrets {
            assert!(stored.iter().all(|p| p.raw.secret.as_str() != s));
            assert!(wallet.store().secret_used(s).await.unwrap());
        }

        // and a reload sees exactly the store
        wallet.load_proofs().await.unwrap();
        assert_eq!(wallet.balance(), 13.into());
        assert_eq!(wallet.proofs().len(), 3);
    }

    #[tokio::test]
    async fn test_secret_reuse_detected_before_any_call() {
        let (_td, mut wallet) = new_wallet(&[13]).await;

        // the deterministic expansion of "base" starts with "0:base";
        // plant it in the spent history
        let mut planted = random_proofs(&[2]).remove(0);
        planted.raw.secret = "0:base".into();
        wallet
            .store()
            .invalidate_proof(&planted.raw)
            .await
            .unwrap();

        let inputs: Proofs = wallet.proofs().iter().map(|p| p.raw.clone()).collect();
        let got = wallet.split(inputs, 13.into(), Some("base")).await;

        // rejected before the client ever runs, so the error is the reuse,
        // not a connection failure
        match got {
            Err(Error::SecretReused(s)) => assert_eq!(s, "0:base"),
            other => panic!("{:?}", other.map(|s| s.all().to_vec())),
        }
    }

    #[tokio::test]
    async fn test_split_rejects_overdraw() {
        let (_td, mut wallet) = new_wallet(&[13]).await;

        let inputs: Proofs = wallet.proofs().iter().map(|p| p.raw.clone()).collect();
        let got = wallet.split(inputs, 14.into(), None).await;
        assert!(matches!(got, Err(Error::InsufficientFunds)));

        let got = wallet.split(vec![], 0.into(), None).await;
        assert!(matches!(got, Err(Error::EmptyProofs)));
    }

    #[tokio::test]
    async fn test_split_to_send_skips_reserved() {
        let (_td, mut wallet) = new_wallet(&[3]).await;

        let all: Proofs = wallet.proofs().iter().map(|p| p.raw.clone()).collect();
        wallet.set_reserved(&all, true).await.unwrap();

        let proofs = wallet.proofs().clone();
        let got = wallet.split_to_send(&proofs, 1.into(), None).await;
        assert!(matches!(got, Err(Error::InsufficientFunds)));
    }

    #[tokio::test]
    async fn test_reserved_accounting() {
        let (_td, mut wallet) = new_wallet(&[7]).await;
        assert_eq!(wallet.balance(), 7.into());
        assert_eq!(wallet.available_balance(), 7.into());

        let four: Proofs = wallet
            .proofs()
            .iter()
            .filter(|p| p.raw.amount == 4.into())
            .map(|p| p.raw.clone())
            .collect();
        let send_id = wallet.set_reserved(&four, true).await.unwrap();

        // reserved value still counts toward balance, not availability
        assert_eq!(wallet.balance(), 7.into());
        assert_eq!(wallet.available_balance(), 3.into());

        let reserved: Vec<_> = wallet.proofs().iter().filter(|p| p.reserved).collect();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].send_id.as_deref(), Some(send_id.as_str()));

        // the store agrees with memory
        let stored = wallet.store().get_proofs().await.unwrap();
        let stored_reserved: Vec<_> = stored.iter().filter(|p| p.reserved).collect();
        assert_eq!(stored_reserved.len(), 1);
        assert_eq!(stored_reserved[0].raw.amount, 4.into());

        // clearing applies the argument on both sides
        wallet.set_reserved(&four, false).await.unwrap();
        assert_eq!(wallet.available_balance(), 7.into());
        assert!(wallet.proofs().iter().all(|p| !p.reserved));
        let stored = wallet.store().get_proofs().await.unwrap();
        assert!(stored.iter().all(|p| !p.reserved && p.send_id.is_none()));
    }

    #[tokio::test]
    async fn test_redeem_incomplete_script() {
        let (_td, mut wallet) = new_wallet(&[]).await;

        let foreign: Proofs = random_proofs(&[5]).iter().map(|p| p.raw.clone()).collect();

        let got = wallet
            .redeem(foreign.clone(), Some("c2NyaXB0".to_owned()), None)
            .await;
        assert!(matches!(got, Err(Error::IncompleteScript)));

        let got = wallet.redeem(foreign, None, Some("c2ln".to_owned())).await;
        assert!(matches!(got, Err(Error::IncompleteScript)));
    }

    #[tokio::test]
    async fn test_token_transfer_between_wallets() {
        // sender side: serialize the send pile
        let (_td, wallet) = new_wallet(&[]).await;
        let send: Proofs = random_proofs(&[5]).iter().map(|p| p.raw.clone()).collect();
        let token = wallet.serialize_proofs(send.clone(), false).unwrap();

        // receiver side: decode and verify the pile against the mint key
        let decoded = Token::from_str(&token).unwrap();
        assert_eq!(decoded.proofs, send);
        assert_eq!(decoded.amount(), 5.into());

        let k = mint_key(5);
        for p in &decoded.proofs {
            assert!(dhke::verify_message(&k, &p.c, p.secret.as_bytes()).unwrap());
        }
    }

    #[tokio::test]
    async fn test_proof_amounts_sorted() {
        let (_td, wallet) = new_wallet(&[13]).await;
        assert_eq!(
            wallet.proof_amounts(),
            vec![1.into(), 4.into(), 8.into()]
        );
    }

    #[tokio::test]
    async fn test_create_p2sh_lock_persists() {
        let (_td, wallet) = new_wallet(&[]).await;

        let lock = wallet.create_p2sh_lock().await.unwrap();
        let address = lock.address.clone().unwrap();

        let got = wallet.store().get_p2sh(&address).await.unwrap();
        assert_eq!(got, Some(lock));
    }
}
