//! Chain parameter sets.
//!
//! Three networks exist: `main`, `test` and `regtest`. Each set fixes the
//! consensus parameters, the network identity constants and the genesis
//! block. Genesis blocks are built once per process and checked against
//! the known hash and Merkle root literals; a mismatch means the wire
//! encoding regressed and is not recoverable.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::block::{Block, BlockHash, BlockHeader, EthHash};
use crate::chain::ChainTip;
use crate::error::{ConsensusError, ConsensusResult};
use crate::params::{ConsensusParams, LOCK_TIER_DAYS};
use crate::script::Script;
use crate::subsidy::{century_lottery, cumulative_subsidy, old_chain_subsidy};
use crate::transaction::{OutPoint, Transaction, TxIn, TxOut, TX_FLAGS_COINBASE};

/// Interest distributed on the old chain before the cut-over, carried
/// into the genesis header.
const OLD_CHAIN_INTEREST: u64 = 39_168_290_492_526_951;

/// Lifetime interest allocation.
const TOTAL_INTEREST: u64 = 240_000_000_000_000_000;

const GENESIS_TIME: u32 = 1_512_403_200;

const GENESIS_INTRO: &str = "By resolving the trust problem of data transmission through technical means, blockchain technology\
 has become an invisible huge force that drives the development of science and technology and a strong\
 force that pushes humanity forward in the right direction. Through its continuous efforts to establish\
 a completely decentralized and borderless public trust implementation system that everyone can\
 participate in, Platopia is a meaningful social practice that combines science and technology with\
 humanity and awakens the seeds of kindness in our hearts so as to inspire and serve every future generation.";

/// The supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        }
    }
}

impl FromStr for Network {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Network::Main),
            "test" => Ok(Network::Test),
            "regtest" => Ok(Network::Regtest),
            other => Err(ConsensusError::UnknownChain(other.to_string())),
        }
    }
}

/// Base58 payload version bytes.
#[derive(Debug, Clone)]
pub struct Base58Prefixes {
    pub pubkey_address: u8,
    pub script_address: u8,
    pub secret_key: u8,
    pub ext_public_key: [u8; 4],
    pub ext_secret_key: [u8; 4],
}

/// Everything that parameterizes one network instance.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,
    pub consensus: ConsensusParams,
    pub disk_magic: [u8; 4],
    pub net_magic: [u8; 4],
    pub default_port: u16,
    pub prune_after_height: u64,
    pub base58_prefixes: Base58Prefixes,
    /// Used when mining is started with a negative thread count.
    pub default_miner_threads: Option<u32>,
    pub mining_requires_peers: bool,
    pub mine_blocks_on_demand: bool,
    genesis: Block,
}

impl ChainParams {
    /// The parameter set of a network, built once per process.
    pub fn for_network(network: Network) -> Arc<ChainParams> {
        static MAIN: OnceLock<Arc<ChainParams>> = OnceLock::new();
        static TEST: OnceLock<Arc<ChainParams>> = OnceLock::new();
        static REGTEST: OnceLock<Arc<ChainParams>> = OnceLock::new();
        let cell = match network {
            Network::Main => &MAIN,
            Network::Test => &TEST,
            Network::Regtest => &REGTEST,
        };
        Arc::clone(cell.get_or_init(|| Arc::new(Self::build(network))))
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis.hash()
    }

    /// The chain tip snapshot corresponding to the genesis block alone.
    pub fn genesis_tip(&self) -> ChainTip {
        let header = &self.genesis.header;
        ChainTip {
            hash: header.hash(),
            height: 0,
            time: header.time,
            median_time_past: header.time,
            chain_interest: header.chain_interest,
            bits: header.bits,
        }
    }

    fn build(network: Network) -> ChainParams {
        match network {
            Network::Main => Self::main(),
            Network::Test => Self::test(),
            Network::Regtest => Self::regtest(),
        }
    }

    fn main() -> ChainParams {
        let consensus = consensus_params(
            960,
            300,
            1_440_000,
            "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            24 * 60 * 60,
            90,
            false,
            false,
        );
        let genesis = create_genesis_block(
            GENESIS_TIME,
            6_029_914_714_024_845_399,
            "0e0c6282441b4b1156fa86331b20c412803d62867ae4c4359973919576e7252b",
            472_776_703,
            3,
            "76a914d21f0e6dce303eb06350458d400d8b582c65562988ac",
            &consensus,
        );
        check_genesis(
            &genesis,
            "56e0b8ce91d07105264979fb4d93ebc641d2eb044c39a011a36881f2c88873b7",
            "7ea48162117efa96921aa8f94c78a579f3f1d35c00499a9713813460e08cb4c1",
        );

        ChainParams {
            network: Network::Main,
            consensus,
            disk_magic: [0xfc, 0xb0, 0xed, 0xee],
            net_magic: [0xfc, 0xf0, 0xed, 0xee],
            default_port: 41_319,
            prune_after_height: 100_000,
            base58_prefixes: Base58Prefixes {
                pubkey_address: 0x38,
                script_address: 5,
                secret_key: 128,
                ext_public_key: [0x04, 0x88, 0xb2, 0x1e],
                ext_secret_key: [0x04, 0x88, 0xad, 0xe4],
            },
            default_miner_threads: None,
            mining_requires_peers: true,
            mine_blocks_on_demand: false,
            genesis,
        }
    }

    fn test() -> ChainParams {
        let consensus = consensus_params(
            960,
            300,
            1_440_000,
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            10 * 60,
            10,
            false,
            false,
        );
        let genesis = create_genesis_block(
            GENESIS_TIME,
            9,
            "31046c8c6e4330cbe95c8023140fe8da6edca0d093cb054655baa3ece1c49bf6",
            0x2007_ffff,
            3,
            "76a914ab9eb67a1bc20e8f138523dffc88586f2f31e94188ac",
            &consensus,
        );
        check_genesis(
            &genesis,
            "7611df4e77e6aa14125a5379f14ef902e23eca1abc4878c8463fb72ef1a5aee3",
            "736939dfdf8c64ea08be450de50294ad397c66a582059a39c9a3e2a28daa876d",
        );

        ChainParams {
            network: Network::Test,
            consensus,
            disk_magic: [0x0b, 0x11, 0x09, 0x07],
            net_magic: [0x0b, 0x11, 0x09, 0x07],
            default_port: 21_319,
            prune_after_height: 1000,
            base58_prefixes: Base58Prefixes {
                pubkey_address: 0x38,
                script_address: 196,
                secret_key: 128,
                ext_public_key: [0x04, 0x35, 0x87, 0xcf],
                ext_secret_key: [0x04, 0x35, 0x83, 0x94],
            },
            default_miner_threads: None,
            mining_requires_peers: true,
            mine_blocks_on_demand: false,
            genesis,
        }
    }

    fn regtest() -> ChainParams {
        let consensus = consensus_params(
            10,
            30,
            1_500,
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            60,
            10,
            true,
            true,
        );
        let genesis = create_genesis_block(
            GENESIS_TIME,
            1,
            "836c063fc357fc6a3e09df0f6781a183e6f0aa49259a43f568ee1c6f8c7ce448",
            0x207f_ffff,
            3,
            "76a914ab9eb67a1bc20e8f138523dffc88586f2f31e94188ac",
            &consensus,
        );
        check_genesis(
            &genesis,
            "98df12433b40e2ac03774aa911de4683099e707ccaff03d7ace0ba57f49f3be8",
            "a3a7521e105bc501b3c9aea0a2064441ea3dab4ff25825f9611d2bcbd64d1151",
        );

        ChainParams {
            network: Network::Regtest,
            consensus,
            disk_magic: [0xfa, 0xbf, 0xb5, 0xda],
            net_magic: [0xda, 0xb5, 0xbf, 0xfa],
            default_port: 18_444,
            prune_after_height: 1000,
            base58_prefixes: Base58Prefixes {
                pubkey_address: 0x38,
                script_address: 196,
                secret_key: 128,
                ext_public_key: [0x04, 0x35, 0x87, 0xcf],
                ext_secret_key: [0x04, 0x35, 0x83, 0x94],
            },
            default_miner_threads: Some(1),
            mining_requires_peers: false,
            mine_blocks_on_demand: true,
            genesis,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn consensus_params(
    blocks_per_day: u32,
    days_per_century: u32,
    old_chain_height: u32,
    pow_limit_hex: &str,
    pow_target_timespan: u32,
    pow_target_spacing: u32,
    allow_min_difficulty_blocks: bool,
    no_retargeting: bool,
) -> ConsensusParams {
    let blocks_per_century = blocks_per_day * days_per_century;
    let mut lock_thresholds = [0u32; 8];
    for (slot, days) in lock_thresholds.iter_mut().zip(LOCK_TIER_DAYS) {
        *slot = days * blocks_per_day;
    }
    let mut pow_limit = [0u8; 32];
    hex::decode_to_slice(pow_limit_hex, &mut pow_limit).expect("valid pow limit hex");

    let mut params = ConsensusParams {
        blocks_per_day,
        days_per_century,
        blocks_per_century,
        subsidy_halving_interval: blocks_per_century,
        decay_ratio: 0.9,
        total_interest: TOTAL_INTEREST,
        lock_thresholds,
        block_reward: 0,
        genesis_reward: 0,
        genesis_chain_interest: OLD_CHAIN_INTEREST,
        pow_limit,
        pow_target_timespan,
        pow_target_spacing,
        allow_min_difficulty_blocks,
        no_retargeting,
    };
    params.block_reward = old_chain_subsidy(old_chain_height + 1, &params);
    params.genesis_reward = cumulative_subsidy(old_chain_height, &params)
        + OLD_CHAIN_INTEREST as i64
        + century_lottery(params.century_for_block(old_chain_height));
    params
}

fn create_genesis_block(
    time: u32,
    nonce: u64,
    mix_hash_hex: &str,
    bits: u32,
    version: i32,
    output_script_hex: &str,
    consensus: &ConsensusParams,
) -> Block {
    let coinbase = Transaction::new(
        TX_FLAGS_COINBASE,
        vec![TxIn::new(
            OutPoint {
                hash: Default::default(),
                index: 0,
                value: consensus.genesis_reward,
            },
            Script::op_zero(),
        )],
        vec![TxOut {
            value: consensus.genesis_reward,
            principal: 0,
            script_pubkey: Script::from_hex(output_script_hex).expect("valid genesis script hex"),
            content: GENESIS_INTRO.to_string(),
            lock_time: 100,
        }],
    );

    let mut block = Block {
        header: BlockHeader {
            version,
            prev_hash: BlockHash::default(),
            merkle_root: Default::default(),
            height: 0,
            time,
            chain_interest: consensus.genesis_chain_interest,
            bits,
            mix_hash: EthHash::from_hex(mix_hash_hex).expect("valid genesis mix hash"),
            nonce,
        },
        txs: vec![coinbase],
    };
    block.update_merkle_root();
    block
}

fn check_genesis(genesis: &Block, hash_hex: &str, merkle_hex: &str) {
    assert_eq!(
        genesis.hash(),
        BlockHash::from_hex(hash_hex).unwrap(),
        "genesis block hash mismatch"
    );
    assert_eq!(
        genesis.header.merkle_root.to_string(),
        merkle_hex,
        "genesis merkle root mismatch"
    );
}

static SELECTED: RwLock<Option<Arc<ChainParams>>> = RwLock::new(None);

/// Select the process-wide parameter set by network name.
///
/// Re-selection is allowed; outside of test harnesses it happens exactly
/// once at startup.
pub fn select_params(chain: &str) -> ConsensusResult<Arc<ChainParams>> {
    let network = Network::from_str(chain)?;
    let params = ChainParams::for_network(network);
    *SELECTED.write() = Some(Arc::clone(&params));
    tracing::info!(chain = network.name(), "Chain parameters selected");
    Ok(params)
}

/// The currently selected parameter set.
///
/// Panics when called before [`select_params`]; selection is a startup
/// precondition.
pub fn params() -> Arc<ChainParams> {
    SELECTED
        .read()
        .clone()
        .expect("chain parameters not selected")
}
