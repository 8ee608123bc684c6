//! Wallet peer session structures
//!
//! Sessions are created and owned by the peer library; these types only
//! mirror what the host reads back from it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Metadata advertised by the remote dApp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}

/// Approved capabilities for one chain namespace (e.g. `eip155`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
    pub accounts: Vec<String>,
}

/// An active peer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSession {
    /// Unique session topic
    pub topic: String,
    pub peer: PeerMetadata,
    pub namespaces: BTreeMap<String, Namespace>,
}

impl PeerSession {
    /// A session is usable once it has both a topic and a peer name
    pub fn is_valid(&self) -> bool {
        !self.topic.is_empty() && !self.peer.name.is_empty()
    }
}

/// CAIP-2 chain identifier restricted to the `eip155` namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl FromStr for ChainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let reference = s
            .strip_prefix("eip155:")
            .ok_or_else(|| Error::Parse(format!("not an eip155 chain: {s}")))?;
        reference
            .parse::<u64>()
            .map(ChainId)
            .map_err(|e| Error::Parse(format!("invalid chain reference {reference:?}: {e}")))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_parse() {
        assert_eq!("eip155:1".parse::<ChainId>().unwrap(), ChainId(1));
        assert_eq!("eip155:11155111".parse::<ChainId>().unwrap(), ChainId(11155111));
        assert!("solana:1".parse::<ChainId>().is_err());
        assert!("eip155:abc".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_chain_id_display() {
        assert_eq!(ChainId(137).to_string(), "eip155:137");
    }

    #[test]
    fn test_session_validity() {
        let mut session = PeerSession {
            topic: "abc".into(),
            peer: PeerMetadata { name: "dapp".into(), ..Default::default() },
            namespaces: BTreeMap::new(),
        };
        assert!(session.is_valid());

        session.topic.clear();
        assert!(!session.is_valid());
    }
}
