//! Ethash facade.
//!
//! Thin wrappers over the `ethash` crate keeping the rest of the miner in
//! terms of [`EthHash`] and plain nonces. The light cache suffices to
//! verify; solving needs the full dataset, which takes minutes of CPU and
//! a large allocation per epoch.

use ethereum_types::{H256, H64};
use sha3::{Digest, Keccak256, Keccak512};

use platopia_consensus::EthHash;

/// Blocks per Ethash epoch.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Epoch index of a block height.
pub fn epoch_of(height: u32) -> u64 {
    height as u64 / EPOCH_LENGTH
}

/// Seed hash of a height's epoch, as served to `eth_getWork` clients.
pub fn seed_hash(height: u32) -> EthHash {
    EthHash(ethash::get_seedhash(epoch_of(height) as usize).0)
}

fn h256(hash: &EthHash) -> H256 {
    H256(hash.0)
}

/// The light cache of one epoch.
pub struct EthashLight {
    epoch: u64,
    full_size: usize,
    cache: Vec<u8>,
}

impl EthashLight {
    /// Build the light cache for `height`'s epoch.
    pub fn new(height: u32) -> Self {
        let epoch = epoch_of(height) as usize;
        let seed = ethash::get_seedhash(epoch);
        let mut cache = vec![0u8; ethash::get_cache_size(epoch)];
        ethash::make_cache(&mut cache, seed);
        Self {
            epoch: epoch as u64,
            full_size: ethash::get_full_size(epoch),
            cache,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn full_size(&self) -> usize {
        self.full_size
    }

    pub(crate) fn cache(&self) -> &[u8] {
        &self.cache
    }

    /// Hashimoto over the light cache: `(mix_hash, result)`.
    pub fn compute(&self, seal_input: &EthHash, nonce: u64) -> (EthHash, EthHash) {
        let (mix, result) = ethash::hashimoto_light(
            h256(seal_input),
            H64::from_low_u64_be(nonce),
            self.full_size,
            &self.cache,
        );
        (EthHash(mix.0), EthHash(result.0))
    }
}

/// The full dataset of one epoch.
pub struct EthashFull {
    epoch: u64,
    full_size: usize,
    dataset: Vec<u8>,
}

impl EthashFull {
    /// Generate the full dataset from a light cache. Expensive.
    pub fn generate(light: &EthashLight) -> Self {
        let mut dataset = vec![0u8; light.full_size()];
        ethash::make_dataset(&mut dataset, light.cache());
        Self {
            epoch: light.epoch(),
            full_size: light.full_size(),
            dataset,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Hashimoto over the full dataset: `(mix_hash, result)`.
    pub fn compute(&self, seal_input: &EthHash, nonce: u64) -> (EthHash, EthHash) {
        let (mix, result) = ethash::hashimoto_full(
            h256(seal_input),
            H64::from_low_u64_be(nonce),
            self.full_size,
            &self.dataset,
        );
        (EthHash(mix.0), EthHash(result.0))
    }
}

/// Verify a claimed solution without touching cache or dataset:
/// `keccak256(keccak512(seal_input || nonce_le) || mix_hash)` must not
/// exceed the boundary.
pub fn quick_check_difficulty(
    seal_input: &EthHash,
    nonce: u64,
    mix_hash: &EthHash,
    boundary: &EthHash,
) -> bool {
    let mut seed_data = [0u8; 40];
    seed_data[..32].copy_from_slice(&seal_input.0);
    seed_data[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = Keccak512::digest(seed_data);

    let mut final_data = [0u8; 96];
    final_data[..64].copy_from_slice(&seed);
    final_data[64..].copy_from_slice(&mix_hash.0);
    let result: [u8; 32] = Keccak256::digest(final_data).into();

    EthHash(result) <= *boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_are_thirty_thousand_blocks() {
        assert_eq!(epoch_of(0), 0);
        assert_eq!(epoch_of(29_999), 0);
        assert_eq!(epoch_of(30_000), 1);
        assert_eq!(epoch_of(65_000), 2);
    }

    #[test]
    fn seed_hash_is_stable_within_an_epoch() {
        assert_eq!(seed_hash(0), seed_hash(29_999));
        assert_ne!(seed_hash(0), seed_hash(30_000));
    }

    #[test]
    fn quick_check_accepts_everything_at_max_boundary() {
        let boundary = EthHash([0xff; 32]);
        let header = EthHash([0x42; 32]);
        let mix = EthHash([0x13; 32]);
        assert!(quick_check_difficulty(&header, 7, &mix, &boundary));
    }

    #[test]
    fn quick_check_rejects_at_zero_boundary() {
        let boundary = EthHash([0x00; 32]);
        let header = EthHash([0x42; 32]);
        let mix = EthHash([0x13; 32]);
        assert!(!quick_check_difficulty(&header, 7, &mix, &boundary));
    }

    #[test]
    fn quick_check_depends_on_every_input() {
        // Find the deterministic result for one input and check that
        // perturbing each component changes it.
        let header = EthHash([0x01; 32]);
        let mix = EthHash([0x02; 32]);
        let tight = |h: &EthHash, n: u64, m: &EthHash| {
            // Recompute the hash and use it as its own boundary: equality
            // passes, anything different with an all-zero boundary fails.
            let mut seed_data = [0u8; 40];
            seed_data[..32].copy_from_slice(&h.0);
            seed_data[32..].copy_from_slice(&n.to_le_bytes());
            let seed = Keccak512::digest(seed_data);
            let mut final_data = [0u8; 96];
            final_data[..64].copy_from_slice(&seed);
            final_data[64..].copy_from_slice(&m.0);
            let result: [u8; 32] = Keccak256::digest(final_data).into();
            EthHash(result)
        };
        let exact = tight(&header, 5, &mix);
        assert!(quick_check_difficulty(&header, 5, &mix, &exact));
        assert_ne!(exact, tight(&header, 6, &mix));
        assert_ne!(exact, tight(&EthHash([0x03; 32]), 5, &mix));
        assert_ne!(exact, tight(&header, 5, &EthHash([0x04; 32])));
    }

    #[test]
    #[ignore = "builds an Ethash light cache (~16 MiB of keccak work)"]
    fn light_compute_is_consistent_with_quick_check() {
        let light = EthashLight::new(0);
        let header = EthHash([0x11; 32]);
        let (mix, result) = light.compute(&header, 1234);
        // The quick check with the produced mix must reproduce `result`
        // when the boundary is exactly `result`.
        assert!(quick_check_difficulty(&header, 1234, &mix, &result));
    }
}
