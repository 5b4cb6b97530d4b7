pub use reqwest::Client as HttpClient;

use std::collections::BTreeMap;
use std::time::Duration;

use bitcoin::secp256k1::PublicKey;
use url::Url;

use crate::amount::Amount;

use super::error::ClientError as Error;
use super::token::{BlindedMessage, BlindedSignature, ProofsHelper};

/// Mint public keys, one per supported power-of-two denomination.
/// Immutable after fetch; required for unblinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MintKeyset(BTreeMap<Amount, PublicKey>);

impl MintKeyset {
    pub fn amount_key(&self, amount: Amount) -> Option<&PublicKey> {
        self.0.get(&amount)
    }

    pub fn amounts(&self) -> impl Iterator<Item = Amount> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Amount, PublicKey)> for MintKeyset {
    fn from_iter<I: IntoIterator<Item = (Amount, PublicKey)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `{"fst": [...], "snd": [...]}` answer to a split; `fst` signs the keep
/// outputs, `snd` the send outputs, positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResponse {
    pub fst: Vec<BlindedSignature>,
    pub snd: Vec<BlindedSignature>,
}

/// `{"<index>": bool}` spendability verdicts, keyed by input position.
pub type CheckResponse = BTreeMap<u64, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFeesResponse {
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltResponse {
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
}

/// wrap Url for compat all
#[derive(Clone, PartialEq, Eq)]
pub struct MintUrl {
    raw: Url,
}

impl MintUrl {
    pub fn as_str(&self) -> &str {
        self.raw.as_str()
    }
}

// https://8333.space:3338 -> https://8333.space:3338/
// https://mint.minibits.cash/Bitcoin -> https://mint.minibits.cash/Bitcoin/
// not endswith / join not work
impl From<Url> for MintUrl {
    fn from(mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()))
        }
        Self { raw: url }
    }
}

impl From<MintUrl> for Url {
    fn from(url: MintUrl) -> Url {
        url.raw
    }
}

impl std::str::FromStr for MintUrl {
    type Err = url::ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.parse::<Url>()?;
        Ok(url.into())
    }
}

impl AsRef<Url> for MintUrl {
    fn as_ref(&self) -> &Url {
        &self.raw
    }
}

use std::fmt;
impl fmt::Debug for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.raw)
    }
}
impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.raw)
    }
}

/// only used when could use
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct HttpOptions {
    #[serde(default)]
    pub connection_verbose: bool,
    pub timeout_connect_ms: Option<u64>,
    pub timeout_get_ms: Option<u64>,
    pub timeout_split_ms: Option<u64>,
    pub timeout_melt_ms: Option<u64>,
}

impl HttpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_verbose(mut self, b: bool) -> Self {
        self.connection_verbose = b;
        self
    }

    pub fn timeout_connect_ms(mut self, millis: u64) -> Self {
        if millis > 0 {
            self.timeout_connect_ms = Some(millis);
        }
        self
    }
    pub fn timeout_connect(&self) -> Option<Duration> {
        self.timeout_connect_ms.map(Duration::from_millis)
    }

    pub fn timeout_get_ms(mut self, millis: u64) -> Self {
        if millis > 0 {
            self.timeout_get_ms = Some(millis);
        }
        self
    }
    pub fn timeout_get(&self) -> Option<Duration> {
        self.timeout_get_ms.map(Duration::from_millis)
    }

    pub fn timeout_split_ms(mut self, millis: u64) -> Self {
        if millis > 0 {
            self.timeout_split_ms = Some(millis);
        }
        self
    }
    pub fn timeout_split(&self) -> Option<Duration> {
        self.timeout_split_ms.map(Duration::from_millis)
    }

    pub fn timeout_melt_ms(mut self, millis: u64) -> Self {
        if millis > 0 {
            self.timeout_melt_ms = Some(millis);
        }
        self
    }
    pub fn timeout_melt(&self) -> Option<Duration> {
        self.timeout_melt_ms.map(Duration::from_millis)
    }
}

/// Thin stateless client for the mint endpoints
/// `keys/mint/split/check/checkfees/melt`.
#[derive(Debug, Clone)]
pub struct MintClient {
    pub(super) url: MintUrl,
    pub(super) http: HttpClient,
    pub(super) options: HttpOptions,
}

impl MintClient {
    pub fn with_http(mint: MintUrl, options: HttpOptions, http: HttpClient) -> Result<Self, Error> {
        Ok(Self {
            url: mint,
            http,
            options,
        })
    }

    pub fn new(mint: MintUrl, options: HttpOptions) -> Result<Self, Error> {
        let mut h = HttpClient::builder().connection_verbose(options.connection_verbose);

        if let Some(t) = options.timeout_connect() {
            h = h.connect_timeout(t)
        }

        Ok(Self {
            http: h.build()?,
            url: mint,
            options,
        })
    }

    pub fn url(&self) -> &MintUrl {
        &self.url
    }

    pub fn urlraw(&self) -> &Url {
        self.url.as_ref()
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    //  curl https://mint.host:3338/keys
    // {"1":"03ba786a...","2":"03361cd8..."}
    pub async fn get_keys(&self) -> Result<MintKeyset, Error> {
        let url = self.urlraw().join("keys")?;

        let mut req = self.http.get(url);
        if let Some(t) = self.options.timeout_get() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        Error::try_parse(&body, httpcode)
    }

    /// Request a mint; the answer is the mint-defined Lightning invoice
    /// descriptor, opaque to the wallet.
    pub async fn request_mint(&self, amount: Amount) -> Result<serde_json::Value, Error> {
        let url = self.urlraw().join("mint")?;

        let mut req = self
            .http
            .get(url)
            .query(&[("amount", amount.to_u64())]);
        if let Some(t) = self.options.timeout_get() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        debug!("{}: {}", httpcode, body);

        Error::try_parse(&body, httpcode)
    }

    /// Submit blinded outputs once the invoice behind `payment_hash` is
    /// settled; one promise comes back per output.
    pub async fn mint(
        &self,
        blinded_messages: &[BlindedMessage],
        payment_hash: Option<&str>,
    ) -> Result<Vec<BlindedSignature>, Error> {
        let url = self.urlraw().join("mint")?;

        #[derive(Debug, Serialize)]
        pub struct Request<'a> {
            blinded_messages: &'a [BlindedMessage],
        }
        let request = Request { blinded_messages };

        let mut req = self.http.post(url).json(&request);
        if let Some(hash) = payment_hash {
            req = req.query(&[("payment_hash", hash)]);
        }
        if let Some(t) = self.options.timeout_split() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        debug!("{}: {}", httpcode, body);

        Error::try_parse(&body, httpcode)
    }

    /// Exchange input proofs for promises over the submitted outputs, cut at
    /// `amount` into the `fst`/`snd` piles.
    pub async fn split(
        &self,
        proofs: impl ProofsHelper,
        amount: Amount,
        outputs: &[BlindedMessage],
    ) -> Result<SplitResponse, Error> {
        let url = self.urlraw().join("split")?;

        #[derive(Debug, Serialize)]
        pub struct Outputs<'a> {
            blinded_messages: &'a [BlindedMessage],
        }
        #[derive(Debug, Serialize)]
        pub struct Request<'a, T: serde::Serialize> {
            proofs: T,
            amount: Amount,
            outputs: Outputs<'a>,
        }
        let request = Request {
            proofs: proofs.to_serde_raw(),
            amount,
            outputs: Outputs {
                blinded_messages: outputs,
            },
        };

        let mut req = self.http.post(url).json(&request);
        if let Some(t) = self.options.timeout_split() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        debug!("{}: {}", httpcode, body);

        Error::try_parse(&body, httpcode)
    }

    /// Ask which of `proofs` the mint still considers spendable.
    pub async fn check(&self, proofs: impl ProofsHelper) -> Result<CheckResponse, Error> {
        let url = self.urlraw().join("check")?;

        #[derive(Debug, Serialize)]
        pub struct Request<T: serde::Serialize> {
            proofs: T,
        }
        let request = Request {
            proofs: proofs.to_serde_raw(),
        };

        let mut req = self.http.post(url).json(&request);
        if let Some(t) = self.options.timeout_split() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        Error::try_parse(&body, httpcode)
    }

    /// Fee the mint will charge for paying `invoice`.
    pub async fn check_fees(&self, invoice: &str) -> Result<CheckFeesResponse, Error> {
        let url = self.urlraw().join("checkfees")?;

        #[derive(Debug, Serialize)]
        pub struct Request<'a> {
            pr: &'a str,
        }
        let request = Request { pr: invoice };

        let mut req = self.http.post(url).json(&request);
        if let Some(t) = self.options.timeout_get() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        Error::try_parse(&body, httpcode)
    }

    /// Burn proofs against a Lightning payment.
    ///
    /// Blocks until the payment settles or fails; use no (or a very long)
    /// melt timeout.
    pub async fn melt(
        &self,
        proofs: impl ProofsHelper,
        invoice: &str,
    ) -> Result<MeltResponse, Error> {
        let url = self.urlraw().join("melt")?;

        #[derive(Debug, Serialize)]
        pub struct Request<'a, T: serde::Serialize> {
            proofs: T,
            invoice: &'a str,
        }
        let request = Request {
            proofs: proofs.to_serde_raw(),
            invoice,
        };

        let mut req = self.http.post(url).json(&request);
        if let Some(t) = self.options.timeout_melt() {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let httpcode = resp.status().as_u16() as i32;
        let body = resp.text().await?;

        debug!("{}: {}", httpcode, body);

        Error::try_parse(&body, httpcode)
    }
}
