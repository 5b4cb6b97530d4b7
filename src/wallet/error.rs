use std::error::Error as StdError;
use std::fmt;

use strum::EnumIs;

use crate::dhke::CryptoError;
use crate::script::ScriptError;
use crate::store::impl_redb::StoreError;

use super::token::TokenError;

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum WalletError<E: StdError = StoreError> {
    /// a candidate output secret is already known to the store; fatal for
    /// the current operation, nothing was sent to the mint
    #[error("secret already used: {0}")]
    SecretReused(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no proofs")]
    EmptyProofs,
    /// a lock needs both the script and its signature
    #[error("incomplete script: script and signature required together")]
    IncompleteScript,
    /// melt came back unpaid
    #[error("could not pay invoice")]
    PaymentFailed,
    #[error("{0}")]
    Config(&'static str),
    #[error("{0}")]
    Crypto(#[from] CryptoError),
    #[error("{0}")]
    Script(#[from] ScriptError),
    #[error("{0}")]
    Token(#[from] TokenError),
    /// mint client returns
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("{0}")]
    Store(E),
    /// custom error
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

impl<E: StdError> WalletError<E> {
    pub fn insufficient_funds() -> Self {
        Self::InsufficientFunds
    }
}

#[derive(Debug)]
//
#[derive(EnumIs)]
pub enum ClientError {
    /// Url Error
    Url(url::ParseError),
    /// Json error: a success status whose body does not deserialize
    Json(serde_json::Error),
    /// transport failure
    Reqwest(reqwest::Error),
    /// the mint answered with an error payload
    Mint(String),
    /// unknown http response
    UnknownResponse(i32, String),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> ClientError {
        Self::Url(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> ClientError {
        Self::Json(err)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> ClientError {
        Self::Reqwest(e)
    }
}

impl StdError for ClientError {}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ClientError::*;

        match &self {
            Url(err) => write!(f, "{}", err),
            Json(err) => write!(f, "{}", err),
            Reqwest(err) => write!(f, "{}", err),
            Mint(err) => write!(f, "{}", err),
            UnknownResponse(code, body) => {
                write!(f, "mint returns unknown response(code: {}): {}", code, body)
            }
        }
    }
}

// The mint reports failure either as a non-2xx status or as a 200 whose body
// carries an `error`/`detail` field; both shapes funnel through here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintErrorResponse {
    #[serde(default)]
    code: Option<i32>,
    error: Option<String>,
    detail: Option<String>,
}

impl ClientError {
    /// Recognize an error payload. `None` means the body is not one.
    pub fn from_body(body: &str) -> Option<Self> {
        let mut json: MintErrorResponse = serde_json::from_str(body).ok()?;

        let message = json.error.take().or_else(|| json.detail.take())?;

        Some(Self::Mint(message))
    }

    pub fn try_parse<T: serde::de::DeserializeOwned>(body: &str, httpcode: i32) -> Result<T, Self> {
        // body first: errors may ride on a 200
        if let Some(e) = Self::from_body(body) {
            return Err(e);
        }

        if !(200..300).contains(&httpcode) {
            return Err(Self::UnknownResponse(httpcode, body.to_owned()));
        }

        serde_json::from_str::<T>(body).map_err(Self::Json)
    }
}
