//! Application messages carried inside frames
//!
//! Requests (host → device) are wrapped in [`ReqData`], responses
//! (device → host) in [`ResData`]. Both are protobuf messages with a single
//! `oneof payload`; an unknown payload tag decodes to `payload: None` so newer
//! firmware can add message kinds without breaking older hosts.

use std::fmt;

use prost::Message;

use crate::error::Result;

/// Request envelope
#[derive(Clone, PartialEq, Message)]
pub struct ReqData {
    #[prost(oneof = "req_data::Payload", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub payload: Option<req_data::Payload>,
}

pub mod req_data {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        VersionRequest(super::VersionRequest),
        #[prost(message, tag = "2")]
        StatusRequest(super::StatusRequest),
        #[prost(message, tag = "3")]
        InitRequest(super::InitWalletRequest),
        #[prost(message, tag = "4")]
        InitCustomRequest(super::InitWalletCustomRequest),
        #[prost(message, tag = "5")]
        DerivePublicKeyRequest(super::DerivePublicKeyRequest),
        #[prost(message, tag = "6")]
        SignEthRequest(super::SignEthRequest),
        #[prost(message, tag = "7")]
        UnlockRequest(super::UnlockRequest),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct VersionRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct StatusRequest {}

/// Generate a fresh wallet on the device
#[derive(Clone, PartialEq, Message)]
pub struct InitWalletRequest {
    /// Number of mnemonic words to generate
    #[prost(uint32, tag = "1")]
    pub length: u32,
    /// Salted PIN hash
    #[prost(bytes = "vec", tag = "2")]
    pub pin: Vec<u8>,
}

/// Import a wallet from user supplied words
#[derive(Clone, PartialEq, Message)]
pub struct InitWalletCustomRequest {
    #[prost(string, tag = "1")]
    pub words: String,
    #[prost(bytes = "vec", tag = "2")]
    pub pin: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DerivePublicKeyRequest {
    #[prost(string, tag = "1")]
    pub path: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct UnlockRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub hash: Vec<u8>,
}

/// Ethereum signing request
#[derive(Clone, PartialEq, Message)]
pub struct SignEthRequest {
    /// Correlation id, echoed back in [`SignResponse::id`]
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(oneof = "sign_eth_request::Tx", tags = "3, 4")]
    pub tx: Option<sign_eth_request::Tx>,
}

pub mod sign_eth_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Tx {
        #[prost(message, tag = "3")]
        Eip191(super::Eip191),
        #[prost(message, tag = "4")]
        Eip2930(super::Eip2930),
    }
}

/// Personal message (`personal_sign`)
#[derive(Clone, PartialEq, Message)]
pub struct Eip191 {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Access-list transaction fields
#[derive(Clone, PartialEq, Message)]
pub struct Eip2930 {
    #[prost(uint64, tag = "1")]
    pub chain_id: u64,
    #[prost(uint64, tag = "2")]
    pub nonce: u64,
    /// Recipient address, empty for contract creation
    #[prost(string, tag = "3")]
    pub to: String,
    /// Value in wei as a `0x` hex quantity
    #[prost(string, tag = "4")]
    pub value: String,
    #[prost(uint64, tag = "5")]
    pub gas_limit: u64,
    /// Gas price in wei as a decimal string
    #[prost(string, tag = "6")]
    pub gas_price: String,
    #[prost(bytes = "vec", tag = "7")]
    pub input: Vec<u8>,
}

/// Response envelope
#[derive(Clone, PartialEq, Message)]
pub struct ResData {
    #[prost(oneof = "res_data::Payload", tags = "1, 2, 3, 4, 5, 6")]
    pub payload: Option<res_data::Payload>,
}

pub mod res_data {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        VersionResponse(super::VersionResponse),
        #[prost(message, tag = "2")]
        StatusResponse(super::StatusResponse),
        #[prost(message, tag = "3")]
        InitWalletResponse(super::InitWalletResponse),
        #[prost(message, tag = "4")]
        DerivePublicKeyResponse(super::DerivePublicKeyResponse),
        #[prost(message, tag = "5")]
        SignResponse(super::SignResponse),
        #[prost(message, tag = "6")]
        WaitForUserActionResponse(super::WaitForUserActionResponse),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct DeviceFeatures {
    #[prost(bool, tag = "1")]
    pub initialized: bool,
    /// 16-byte capability vector
    #[prost(bytes = "vec", tag = "2")]
    pub support_mask: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct VersionResponse {
    #[prost(string, tag = "1")]
    pub version: String,
    #[prost(message, optional, tag = "2")]
    pub features: Option<DeviceFeatures>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StatusResponse {
    /// 16-byte runtime state vector
    #[prost(bytes = "vec", tag = "1")]
    pub status_mask: Vec<u8>,
}

/// Answer to both generate and import requests; `mnemonic` is empty for imports
#[derive(Clone, PartialEq, Message)]
pub struct InitWalletResponse {
    #[prost(string, tag = "1")]
    pub mnemonic: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DerivePublicKeyResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
}

/// Signature without recovery id
#[derive(Clone, PartialEq, Message)]
pub struct SignResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// 64 bytes, `r || s`
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    /// 32-byte digest that was signed
    #[prost(bytes = "vec", tag = "3")]
    pub pre_hash: Vec<u8>,
    /// Public key of the signing account
    #[prost(bytes = "vec", tag = "4")]
    pub public_key: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WaitForUserActionResponse {}

impl ReqData {
    fn wrap(payload: req_data::Payload) -> Self {
        Self { payload: Some(payload) }
    }

    pub fn version() -> Self {
        Self::wrap(req_data::Payload::VersionRequest(VersionRequest {}))
    }

    pub fn status() -> Self {
        Self::wrap(req_data::Payload::StatusRequest(StatusRequest {}))
    }

    pub fn init_wallet(length: u32, pin_hash: impl Into<Vec<u8>>) -> Self {
        Self::wrap(req_data::Payload::InitRequest(InitWalletRequest {
            length,
            pin: pin_hash.into(),
        }))
    }

    pub fn init_wallet_custom(words: impl Into<String>, pin_hash: impl Into<Vec<u8>>) -> Self {
        Self::wrap(req_data::Payload::InitCustomRequest(InitWalletCustomRequest {
            words: words.into(),
            pin: pin_hash.into(),
        }))
    }

    pub fn derive_public_key(path: impl Into<String>) -> Self {
        Self::wrap(req_data::Payload::DerivePublicKeyRequest(DerivePublicKeyRequest {
            path: path.into(),
        }))
    }

    pub fn unlock(pin_hash: impl Into<Vec<u8>>) -> Self {
        Self::wrap(req_data::Payload::UnlockRequest(UnlockRequest {
            hash: pin_hash.into(),
        }))
    }

    pub fn sign_eip191(id: u32, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::wrap(req_data::Payload::SignEthRequest(SignEthRequest {
            id,
            path: path.into(),
            tx: Some(sign_eth_request::Tx::Eip191(Eip191 {
                message: message.into(),
            })),
        }))
    }

    pub fn sign_eip2930(id: u32, path: impl Into<String>, tx: Eip2930) -> Self {
        Self::wrap(req_data::Payload::SignEthRequest(SignEthRequest {
            id,
            path: path.into(),
            tx: Some(sign_eth_request::Tx::Eip2930(tx)),
        }))
    }

    /// Request kind name, for logging
    pub fn kind(&self) -> &'static str {
        use req_data::Payload as P;
        match &self.payload {
            Some(P::VersionRequest(_)) => "version_request",
            Some(P::StatusRequest(_)) => "status_request",
            Some(P::InitRequest(_)) => "init_request",
            Some(P::InitCustomRequest(_)) => "init_custom_request",
            Some(P::DerivePublicKeyRequest(_)) => "derive_public_key_request",
            Some(P::SignEthRequest(_)) => "sign_eth_request",
            Some(P::UnlockRequest(_)) => "unlock_request",
            None => "empty",
        }
    }
}

impl ResData {
    /// Decode a frame payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(Self::decode(payload)?)
    }

    /// Response kind name, for logging
    pub fn kind(&self) -> &'static str {
        use res_data::Payload as P;
        match &self.payload {
            Some(P::VersionResponse(_)) => "version_response",
            Some(P::StatusResponse(_)) => "status_response",
            Some(P::InitWalletResponse(_)) => "init_wallet_response",
            Some(P::DerivePublicKeyResponse(_)) => "derive_public_key_response",
            Some(P::SignResponse(_)) => "sign_response",
            Some(P::WaitForUserActionResponse(_)) => "wait_for_user_action_response",
            None => "unknown",
        }
    }
}

impl fmt::Display for ReqData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReqData[{}]({} bytes)", self.kind(), self.encoded_len())
    }
}

impl fmt::Display for ResData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResData[{}]({} bytes)", self.kind(), self.encoded_len())
    }
}
