//! Block primitives.
//!
//! Two hash domains meet in the header. The block identity is the
//! double-SHA256 of the full serialized header, displayed byte-reversed.
//! The Ethash seal input is the Keccak-256 of the *base* header, which
//! truncates after `bits`; mix hash and boundary live in the same Keccak
//! domain and are displayed in natural byte order with a `0x` prefix.

use std::fmt;

use sha3::{Digest, Keccak256};

use crate::serialize::sha256d;
use crate::transaction::{Transaction, TxId};

/// Block identity hash (double-SHA256, byte-reversed display).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rev = self.0;
        rev.reverse();
        write!(f, "{}", hex::encode(rev))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

/// A 256-bit value in the Ethash domain: seal hashes, mix hashes and
/// boundaries. Natural byte order, big-endian comparisons.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EthHash(pub [u8; 32]);

impl EthHash {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EthHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthHash({self})")
    }
}

/// The full block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: BlockHash,
    pub merkle_root: TxId,
    pub height: u32,
    pub time: u32,
    pub chain_interest: u64,
    pub bits: u32,
    pub mix_hash: EthHash,
    pub nonce: u64,
}

impl BlockHeader {
    /// Serialized header: fixed-width little-endian fields, hashes raw.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_hash.0);
        out.extend_from_slice(&self.merkle_root.0);
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.chain_interest.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.mix_hash.0);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// The block identity hash.
    pub fn hash(&self) -> BlockHash {
        BlockHash(sha256d(&self.serialize()))
    }

    /// The Ethash seal input of this header's base part.
    pub fn ethash(&self) -> EthHash {
        BaseHeader::from(self).ethash()
    }
}

/// The header with `mix_hash` and `nonce` stripped: the Ethash seal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseHeader {
    pub version: i32,
    pub prev_hash: BlockHash,
    pub merkle_root: TxId,
    pub height: u32,
    pub time: u32,
    pub chain_interest: u64,
    pub bits: u32,
}

impl From<&BlockHeader> for BaseHeader {
    fn from(h: &BlockHeader) -> Self {
        Self {
            version: h.version,
            prev_hash: h.prev_hash,
            merkle_root: h.merkle_root,
            height: h.height,
            time: h.time,
            chain_interest: h.chain_interest,
            bits: h.bits,
        }
    }
}

impl BaseHeader {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(88);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.prev_hash.0);
        out.extend_from_slice(&self.merkle_root.0);
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.chain_interest.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out
    }

    /// Keccak-256 of the serialized base header.
    pub fn ethash(&self) -> EthHash {
        let digest = Keccak256::digest(self.serialize());
        EthHash(digest.into())
    }
}

/// A block: header plus transactions, coinbase first.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Serialized size of the whole block on the wire.
    pub fn serialized_size(&self) -> u64 {
        let mut size = self.header.serialize().len() as u64;
        let mut prefix = Vec::new();
        crate::serialize::write_compact_size(&mut prefix, self.txs.len() as u64);
        size += prefix.len() as u64;
        size + self.txs.iter().map(|tx| tx.serialized_size()).sum::<u64>()
    }

    /// Recompute and store the Merkle root over the current transactions.
    pub fn update_merkle_root(&mut self) {
        self.header.merkle_root = block_merkle_root(&self.txs);
    }
}

/// The Merkle root over transaction ids: pairwise double-SHA256 with the
/// odd leaf duplicated, a single transaction hashing to itself.
pub fn block_merkle_root(txs: &[Transaction]) -> TxId {
    if txs.is_empty() {
        return TxId::default();
    }
    let mut layer: Vec<[u8; 32]> = txs.iter().map(|tx| tx.id().0).collect();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity((layer.len() + 1) / 2);
        for pair in layer.chunks(2) {
            let left = pair[0];
            let right = *pair.get(1).unwrap_or(&pair[0]);
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(&left);
            buf[32..].copy_from_slice(&right);
            next.push(sha256d(&buf));
        }
        layer = next;
    }
    TxId(layer[0])
}
