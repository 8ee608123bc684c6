//! Wallet peer bridge
//!
//! Serves signing requests coming from a remote dApp session. The session
//! library, the user dialog and the chain node are external; each one is
//! reached through a trait so the bridge itself only decides *what* to ask.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use oskey_core::constants::DEFAULT_GAS_LIMIT;
use oskey_core::message::Eip2930;
use oskey_transport::ConnectionState;
use oskey_types::{ChainId, PeerSession};

use crate::device::WalletSigner;
use crate::error::{Error, Result};
use crate::events::DeviceEvent;

const PERSONAL_SIGN: &str = "personal_sign";
const SEND_TRANSACTION: &str = "eth_sendTransaction";

/// Column width used when laying out confirmation text
const WRAP_WIDTH: usize = 80;

/// JSON-RPC error returned to the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRpcError {
    pub code: i64,
    pub message: String,
}

impl PeerRpcError {
    pub fn user_rejected() -> Self {
        Self::new(5000, "User rejected.")
    }

    pub fn unauthorized_method() -> Self {
        Self::new(3001, "Unauthorized method.")
    }

    pub fn unsupported_method() -> Self {
        Self::new(5101, "Unsupported methods.")
    }

    pub fn user_disconnected() -> Self {
        Self::new(6000, "User disconnected.")
    }

    fn new(code: i64, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for PeerRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Answer to a session request
#[derive(Debug, Clone, PartialEq)]
pub enum PeerResponse {
    Result(Value),
    Error(PeerRpcError),
}

impl PeerResponse {
    /// JSON-RPC 2.0 response object
    pub fn to_json(&self, id: u64) -> Value {
        match self {
            Self::Result(result) => json!({ "id": id, "jsonrpc": "2.0", "result": result }),
            Self::Error(e) => json!({
                "id": id,
                "jsonrpc": "2.0",
                "error": { "code": e.code, "message": e.message },
            }),
        }
    }
}

/// Signing request received on a peer session
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRequest {
    pub id: u64,
    pub topic: String,
    /// CAIP-2 chain the request targets, e.g. `eip155:1`
    pub chain_id: String,
    pub method: String,
    pub params: Value,
}

/// Session library
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn active_sessions(&self) -> Result<Vec<PeerSession>>;

    /// Pair with a dApp from its connection URI
    async fn pair(&self, uri: &str) -> Result<()>;

    async fn disconnect(&self, topic: &str, reason: PeerRpcError) -> Result<()>;

    async fn respond(&self, topic: &str, id: u64, response: PeerResponse) -> Result<()>;
}

/// User consent dialog
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Chain node access
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Next nonce for `address`
    async fn nonce(&self, chain: ChainId, address: Address) -> Result<u64>;

    /// Current gas price in wei
    async fn gas_price(&self, chain: ChainId) -> Result<U256>;

    /// Submit a signed transaction, returning its hash
    async fn broadcast(&self, chain: ChainId, tx: &Eip2930, signature: &str) -> Result<String>;
}

/// Bridge between peer sessions and the device
pub struct PeerBridge {
    client: Arc<dyn PeerClient>,
    signer: Arc<dyn WalletSigner>,
    confirmer: Arc<dyn Confirmer>,
    chain: Arc<dyn ChainProvider>,
    armed: AtomicBool,
}

impl PeerBridge {
    pub fn new(
        client: Arc<dyn PeerClient>,
        signer: Arc<dyn WalletSigner>,
        confirmer: Arc<dyn Confirmer>,
        chain: Arc<dyn ChainProvider>,
    ) -> Self {
        Self {
            client,
            signer,
            confirmer,
            chain,
            armed: AtomicBool::new(false),
        }
    }

    /// Start serving requests
    pub fn arm(&self) {
        if !self.armed.swap(true, Ordering::AcqRel) {
            info!("Peer handlers armed");
        }
    }

    /// Stop serving requests
    pub fn disarm(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            info!("Peer handlers disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Arm on [`DeviceEvent::Ready`], disarm when the device disconnects
    pub fn follow(self: Arc<Self>, mut events: broadcast::Receiver<DeviceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DeviceEvent::Ready) => self.arm(),
                    Ok(DeviceEvent::Connection(ConnectionState::Disconnected)) => self.disarm(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Peer bridge lagged behind events"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Valid sessions known to the session library
    pub async fn sessions(&self) -> Result<Vec<PeerSession>> {
        let sessions = self.client.active_sessions().await?;
        Ok(sessions.into_iter().filter(PeerSession::is_valid).collect())
    }

    pub async fn pair(&self, uri: &str) -> Result<()> {
        info!("Pairing with peer");
        self.client.pair(uri).await
    }

    pub async fn disconnect(&self, topic: &str) -> Result<()> {
        info!(topic, "Disconnecting peer session");
        self.client.disconnect(topic, PeerRpcError::user_disconnected()).await
    }

    /// Serve one session request and send the response
    ///
    /// # Errors
    ///
    /// Only a failure to deliver the response is returned; request failures
    /// are answered with a JSON-RPC error.
    pub async fn handle_request(&self, request: PeerRequest) -> Result<()> {
        info!(id = request.id, method = %request.method, "Peer request");

        let outcome = if !self.is_armed() {
            warn!(id = request.id, "Device not ready for peer requests");
            Err(PeerRpcError::user_rejected())
        } else {
            match request.method.as_str() {
                PERSONAL_SIGN => self.personal_sign(&request).await,
                SEND_TRANSACTION => self.send_transaction(&request).await,
                other => {
                    debug!(method = other, "Unsupported peer method");
                    Err(PeerRpcError::unsupported_method())
                }
            }
        };

        let response = match outcome {
            Ok(result) => PeerResponse::Result(result),
            Err(e) => PeerResponse::Error(e),
        };
        self.client.respond(&request.topic, request.id, response).await
    }

    async fn personal_sign(&self, request: &PeerRequest) -> std::result::Result<Value, PeerRpcError> {
        let message = first_param(&request.params)
            .and_then(Value::as_str)
            .ok_or_else(|| rejected("personal_sign without a message"))?;
        let text = decode_message(message).map_err(rejected)?;

        let prompt = format!("Do you agree sign message?\n\n{}", wrap(&text, WRAP_WIDTH));
        if !self.confirmer.confirm(&prompt).await {
            return Err(PeerRpcError::user_rejected());
        }

        let signature = self.signer.sign_message(&text).await.map_err(rejected)?;
        Ok(Value::String(signature))
    }

    async fn send_transaction(&self, request: &PeerRequest) -> std::result::Result<Value, PeerRpcError> {
        let fields = first_param(&request.params)
            .and_then(Value::as_object)
            .ok_or_else(|| rejected("eth_sendTransaction without a transaction"))?;

        let address = self.signer.address();
        let from = fields.get("from").and_then(Value::as_str).unwrap_or_default();
        let matches_device = address.is_some_and(|a| from.eq_ignore_ascii_case(&a.to_string()));
        if !matches_device {
            warn!(from, "Transaction sender is not the device account");
            return Err(PeerRpcError::unauthorized_method());
        }
        let address = address.ok_or_else(PeerRpcError::unauthorized_method)?;

        let chain = ChainId::from_str(&request.chain_id).map_err(rejected)?;
        let tx = self.fill_transaction(fields, chain, address).await.map_err(rejected)?;

        let prompt = format!("Do you agree sign transaction?\n\n{}", describe_transaction(&tx));
        if !self.confirmer.confirm(&prompt).await {
            return Err(PeerRpcError::user_rejected());
        }

        let signature = self.signer.sign_transaction(tx.clone()).await.map_err(rejected)?;
        let hash = self
            .chain
            .broadcast(ChainId(tx.chain_id), &tx, &signature)
            .await
            .map_err(rejected)?;

        info!(%hash, "Transaction broadcast");
        Ok(Value::String(hash))
    }

    async fn fill_transaction(&self, fields: &Map<String, Value>, chain: ChainId, from: Address) -> Result<Eip2930> {
        let chain_id = match quantity(fields, &["chainId"])? {
            Some(id) => to_u64(id, "chainId")?,
            None => chain.0,
        };
        let chain = ChainId(chain_id);

        let nonce = match quantity(fields, &["nonce"])? {
            Some(nonce) => to_u64(nonce, "nonce")?,
            None => self.chain.nonce(chain, from).await?,
        };

        let gas_limit = match quantity(fields, &["gas", "gasLimit"])? {
            Some(limit) => to_u64(limit, "gas")?,
            None => DEFAULT_GAS_LIMIT,
        };

        let gas_price = match quantity(fields, &["gasPrice"])? {
            Some(price) => price,
            None => self.chain.gas_price(chain).await?,
        };

        let value = quantity(fields, &["value"])?.unwrap_or_default();

        let input = match fields.get("data").or_else(|| fields.get("input")).and_then(Value::as_str) {
            Some(data) => decode_hex(data).map_err(|e| Error::Peer(format!("invalid data: {e}")))?,
            None => Vec::new(),
        };

        Ok(Eip2930 {
            chain_id,
            nonce,
            to: fields.get("to").and_then(Value::as_str).unwrap_or_default().to_string(),
            value: format!("0x{value:x}"),
            gas_limit,
            gas_price: gas_price.to_string(),
            input,
        })
    }
}

fn rejected(reason: impl fmt::Display) -> PeerRpcError {
    warn!(%reason, "Rejecting peer request");
    PeerRpcError::user_rejected()
}

fn first_param(params: &Value) -> Option<&Value> {
    match params {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

/// First present field among `keys`, as a number or a hex/decimal string
fn quantity(fields: &Map<String, Value>, keys: &[&str]) -> Result<Option<U256>> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()).map(|v| (*key, v)))
    else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::String(s) => U256::from_str(s).ok(),
        _ => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| Error::Peer(format!("invalid {key}: {value}")))
}

fn to_u64(value: U256, name: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Peer(format!("{name} out of range: {value}")))
}

fn decode_hex(data: &str) -> std::result::Result<Vec<u8>, hex::FromHexError> {
    hex::decode(data.strip_prefix("0x").unwrap_or(data))
}

/// Personal messages arrive hex encoded; plain text is passed through
fn decode_message(message: &str) -> Result<String> {
    if !message.starts_with("0x") {
        return Ok(message.to_string());
    }
    let bytes = decode_hex(message).map_err(|e| Error::Peer(format!("invalid message hex: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Peer(format!("message is not UTF-8: {e}")))
}

fn wrap(text: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= width {
        return text.to_string();
    }
    chars
        .chunks(width)
        .map(|line| line.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_transaction(tx: &Eip2930) -> String {
    let to = if tx.to.is_empty() { "(contract creation)" } else { tx.to.as_str() };
    let data = if tx.input.is_empty() {
        "0x".to_string()
    } else {
        format!("0x{}", hex::encode(&tx.input))
    };

    [
        format!("chainId:\n{}", tx.chain_id),
        format!("to:\n{}", wrap(to, 60)),
        format!("value:\n{}", tx.value),
        format!("nonce:\n{}", tx.nonce),
        format!("gasLimit:\n{}", tx.gas_limit),
        format!("gasPrice:\n{}", tx.gas_price),
        format!("data:\n{}", wrap(&data, 60)),
    ]
    .join("\n\n")
}
