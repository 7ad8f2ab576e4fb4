//! Transaction primitives.

use std::fmt;
use std::sync::OnceLock;

use crate::amount::{money_range, Amount, COIN};
use crate::error::ConsensusError;
use crate::script::Script;
use crate::serialize::{sha256d, write_bytes, write_compact_size, write_varint};

/// Flag bit marking a coinbase transaction.
pub const TX_FLAGS_COINBASE: u32 = 1;

/// Transaction identifier: the double-SHA256 of the serialized transaction.
///
/// Displayed byte-reversed, as the chain has always done.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rev = self.0;
        rev.reverse();
        write!(f, "{}", hex::encode(rev))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

/// A reference to a previous transaction output, carrying its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub hash: TxId,
    pub index: u32,
    pub value: Amount,
}

impl OutPoint {
    pub fn new(hash: TxId, index: u32, value: Amount) -> Self {
        Self { hash, index, value }
    }

    /// The null prevout used by coinbase inputs.
    pub fn null() -> Self {
        Self {
            hash: TxId::default(),
            index: 0,
            value: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash == TxId::default()
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hash.0);
        write_varint(out, self.index as u64);
        write_varint(out, self.value as u64);
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Script) -> Self {
        Self { prevout, script_sig }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        self.prevout.serialize_into(out);
        write_bytes(out, self.script_sig.as_bytes());
    }
}

/// A transaction output.
///
/// `principal > 0` marks an interest-bearing deposit; `value - principal`
/// is the accrued interest. `lock_time` is the number of blocks the output
/// stays unspendable after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub principal: Amount,
    pub script_pubkey: Script,
    pub content: String,
    pub lock_time: u32,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            principal: 0,
            script_pubkey,
            content: String::new(),
            lock_time: 0,
        }
    }

    /// Interest carried by this output, zero for plain outputs.
    pub fn interest(&self) -> Amount {
        if self.principal > 0 && self.value > self.principal {
            self.value - self.principal
        } else {
            0
        }
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        write_varint(out, self.value as u64);
        write_varint(out, self.principal as u64);
        write_bytes(out, self.script_pubkey.as_bytes());
        write_bytes(out, self.content.as_bytes());
        write_varint(out, self.lock_time as u64);
    }
}

/// An immutable transaction with a cached identifier.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub version: u32,
    pub flags: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    id: OnceLock<TxId>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Transaction {}

impl Transaction {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(flags: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            flags,
            inputs,
            outputs,
            id: OnceLock::new(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.flags & TX_FLAGS_COINBASE != 0
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        write_varint(&mut out, self.version as u64);
        write_varint(&mut out, self.flags as u64);
        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.serialize_into(&mut out);
        }
        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.serialize_into(&mut out);
        }
        out
    }

    pub fn id(&self) -> TxId {
        *self.id.get_or_init(|| TxId(sha256d(&self.serialize())))
    }

    pub fn serialized_size(&self) -> u64 {
        self.serialize().len() as u64
    }

    /// Sum of output values, range-checked.
    pub fn value_out(&self) -> Result<Amount, ConsensusError> {
        let mut total: Amount = 0;
        for output in &self.outputs {
            total += output.value;
            if !money_range(output.value) || !money_range(total) {
                return Err(ConsensusError::ValueOutOfRange);
            }
        }
        Ok(total)
    }

    /// Sum of output values counting only the principal of deposits.
    pub fn value_out_without_interest(&self) -> Result<Amount, ConsensusError> {
        let mut total: Amount = 0;
        for output in &self.outputs {
            total += if output.principal > 0 {
                output.principal
            } else {
                output.value
            };
            if !money_range(output.value) || !money_range(output.principal) || !money_range(total)
            {
                return Err(ConsensusError::ValueOutOfRange);
            }
        }
        Ok(total)
    }

    /// Total interest of all deposit outputs. Coinbase carries none.
    pub fn interest(&self) -> Result<Amount, ConsensusError> {
        if self.is_coinbase() {
            return Ok(0);
        }
        let mut total: Amount = 0;
        for output in &self.outputs {
            total += output.interest();
            if !money_range(output.value) || !money_range(output.principal) || !money_range(total)
            {
                return Err(ConsensusError::ValueOutOfRange);
            }
        }
        Ok(total)
    }

    /// Sig-op count across all scripts.
    pub fn sigop_count(&self) -> u64 {
        let inputs: u64 = self.inputs.iter().map(|i| i.script_sig.sigop_count()).sum();
        let outputs: u64 = self
            .outputs
            .iter()
            .map(|o| o.script_pubkey.sigop_count())
            .sum();
        inputs + outputs
    }

    /// Size with per-input overhead discounted, the denominator of the
    /// coin-age priority.
    pub fn modified_size(&self) -> u64 {
        let mut size = self.serialized_size();
        for input in &self.inputs {
            let offset = 41 + input.script_sig.len().min(110) as u64;
            if size > offset {
                size -= offset;
            }
        }
        size
    }
}

/// A free-standing priority threshold: transactions above it may enter a
/// block without paying fees.
pub fn allow_free(priority: f64) -> bool {
    priority > COIN as f64 * 144.0 / 250.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_tx(values: &[Amount]) -> Transaction {
        let outputs = values
            .iter()
            .map(|&v| TxOut::new(v, Script::new()))
            .collect();
        Transaction::new(
            0,
            vec![TxIn::new(
                OutPoint::new(TxId([1; 32]), 0, values.iter().sum()),
                Script::new(),
            )],
            outputs,
        )
    }

    #[test]
    fn id_is_stable_and_cached() {
        let tx = plain_tx(&[5 * COIN]);
        assert_eq!(tx.id(), tx.id());
        let again = Transaction::new(0, tx.inputs.clone(), tx.outputs.clone());
        assert_eq!(tx.id(), again.id());
    }

    #[test]
    fn interest_counts_only_deposits() {
        let mut tx = plain_tx(&[10 * COIN]);
        assert_eq!(tx.interest().unwrap(), 0);

        tx.outputs.push(TxOut {
            value: 11 * COIN,
            principal: 10 * COIN,
            script_pubkey: Script::new(),
            content: String::new(),
            lock_time: 16 * 960,
        });
        let tx = Transaction::new(0, tx.inputs, tx.outputs);
        assert_eq!(tx.interest().unwrap(), COIN);
        assert_eq!(
            tx.value_out_without_interest().unwrap(),
            10 * COIN + 10 * COIN
        );
    }

    #[test]
    fn coinbase_has_no_interest() {
        let tx = Transaction::new(
            TX_FLAGS_COINBASE,
            vec![TxIn::new(OutPoint::null(), Script::op_zero())],
            vec![TxOut {
                value: 2 * COIN,
                principal: COIN,
                script_pubkey: Script::new(),
                content: String::new(),
                lock_time: 0,
            }],
        );
        assert!(tx.is_coinbase());
        assert_eq!(tx.interest().unwrap(), 0);
    }

    #[test]
    fn value_out_detects_overflow() {
        let tx = plain_tx(&[crate::MAX_MONEY, crate::MAX_MONEY]);
        assert!(matches!(
            tx.value_out(),
            Err(ConsensusError::ValueOutOfRange)
        ));
    }

    #[test]
    fn modified_size_discounts_inputs() {
        let tx = plain_tx(&[COIN]);
        assert!(tx.modified_size() < tx.serialized_size());
    }

    #[test]
    fn allow_free_threshold() {
        assert!(allow_free(COIN as f64));
        assert!(!allow_free(0.0));
        assert!(!allow_free(COIN as f64 * 144.0 / 250.0));
    }
}
