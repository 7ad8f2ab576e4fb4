//! Script bytes.
//!
//! Script execution lives in the validation collaborator; the template
//! builder and coinbase construction only need to carry script bytes and
//! count their sig-ops.

use std::fmt;

const OP_0: u8 = 0x00;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Raw script bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    /// Empty script.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The canonical coinbase input script: a single `OP_0`.
    pub fn op_zero() -> Self {
        Self(vec![OP_0])
    }

    /// Script from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Script from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Legacy sig-op count: every CHECKSIG-class opcode counts once,
    /// CHECKMULTISIG-class opcodes count twenty.
    pub fn sigop_count(&self) -> u64 {
        let mut count = 0;
        for &b in &self.0 {
            match b {
                OP_CHECKSIG | OP_CHECKSIGVERIFY => count += 1,
                OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => count += 20,
                _ => {}
            }
        }
        count
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_zero_is_single_byte() {
        assert_eq!(Script::op_zero().as_bytes(), &[0x00]);
    }

    #[test]
    fn p2pkh_counts_one_sigop() {
        let script =
            Script::from_hex("76a914d21f0e6dce303eb06350458d400d8b582c65562988ac").unwrap();
        assert_eq!(script.len(), 25);
        assert_eq!(script.sigop_count(), 1);
    }

    #[test]
    fn multisig_counts_twenty() {
        let script = Script::from_bytes(vec![0x52, 0xae]);
        assert_eq!(script.sigop_count(), 20);
    }
}
