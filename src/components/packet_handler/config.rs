use std::path::PathBuf;

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::types::{TimeDiff, Timestamp};

/// Default shard the node participates in.
const DEFAULT_SHARD_ID: &str = "casper";

/// Default number of fresh validators generated when no bonds file is given.
const DEFAULT_NUM_VALIDATORS: usize = 5;

/// Default bond bounds.
const DEFAULT_MINIMUM_BOND: u64 = 1;
const DEFAULT_MAXIMUM_BOND: u64 = u64::MAX;

/// Default overall deadline of the genesis-approval ceremony.
const DEFAULT_APPROVE_GENESIS_DURATION: TimeDiff = TimeDiff::from_seconds(300);

/// Default rebroadcast and polling interval of the genesis-approval ceremony.
const DEFAULT_APPROVE_GENESIS_INTERVAL: TimeDiff = TimeDiff::from_seconds(5);

/// Default delay before the first approved-block request when bootstrapping.
const DEFAULT_INITIAL_REQUEST_DELAY: TimeDiff = TimeDiff::from_seconds(10);

/// The role the node starts in, selecting the initial handler state.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// A committee member of the genesis ceremony: signs the circulated candidate.
    ApproveGenesis,
    /// The genesis constructor: builds the candidate and collects approvals.
    Standalone,
    /// A node joining an existing network.
    Default,
}

/// Packet handler configuration.
#[derive(Clone, DataSize, Debug, Serialize, Deserialize)]
// Disallow unknown fields to ensure config files and command-line overrides contain valid keys.
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The role the node starts in.
    pub role: Role,
    /// The shard this node participates in.
    pub shard_id: String,
    /// The timestamp the genesis candidate is constructed with. All committee members must use
    /// the same value; when absent the current time is used, with a warning.
    pub deploy_timestamp: Option<Timestamp>,
    /// Path to the bonds file (`<hex public key> <stake>` per line).
    #[data_size(skip)]
    pub bonds_file: Option<PathBuf>,
    /// Path to the wallets file (`<hex public key>,<balance>` per line).
    #[data_size(skip)]
    pub wallets_file: Option<PathBuf>,
    /// Directory generated genesis artifacts are written to.
    #[data_size(skip)]
    pub genesis_path: PathBuf,
    /// How many fresh validators to generate when no bonds file is given.
    pub num_validators: usize,
    /// The smallest stake a generated validator is bonded with.
    pub minimum_bond: u64,
    /// The largest permissible bond.
    pub maximum_bond: u64,
    /// Whether the genesis state includes a faucet.
    pub has_faucet: bool,
    /// How many distinct validator signatures make a candidate an approved block.
    pub required_sigs: u32,
    /// The minimum length of the genesis-approval ceremony.
    pub approve_genesis_duration: TimeDiff,
    /// The candidate rebroadcast interval; also the polling interval of the promotion loop.
    pub approve_genesis_interval: TimeDiff,
    /// Path to the known-validators file (`<hex public key>` per line), used when bootstrapping.
    #[data_size(skip)]
    pub known_validators_file: Option<PathBuf>,
    /// Delay before the first approved-block request when bootstrapping; also the re-request
    /// interval.
    pub initial_request_delay: TimeDiff,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            role: Role::Default,
            shard_id: DEFAULT_SHARD_ID.to_string(),
            deploy_timestamp: None,
            bonds_file: None,
            wallets_file: None,
            genesis_path: PathBuf::from("genesis"),
            num_validators: DEFAULT_NUM_VALIDATORS,
            minimum_bond: DEFAULT_MINIMUM_BOND,
            maximum_bond: DEFAULT_MAXIMUM_BOND,
            has_faucet: false,
            required_sigs: 0,
            approve_genesis_duration: DEFAULT_APPROVE_GENESIS_DURATION,
            approve_genesis_interval: DEFAULT_APPROVE_GENESIS_INTERVAL,
            known_validators_file: None,
            initial_request_delay: DEFAULT_INITIAL_REQUEST_DELAY,
        }
    }
}

#[cfg(test)]
/// Shortened ceremony intervals for local testing.
const TEST_APPROVE_GENESIS_INTERVAL: TimeDiff = TimeDiff::from_millis(20);

#[cfg(test)]
impl Config {
    /// Constructs a configuration for the given role with intervals suitable for testing.
    pub(crate) fn test_config(role: Role, genesis_path: PathBuf) -> Self {
        Config {
            role,
            shard_id: "casper-test".to_string(),
            deploy_timestamp: Some(Timestamp::from(1_000)),
            genesis_path,
            approve_genesis_duration: TimeDiff::from_millis(0),
            approve_genesis_interval: TEST_APPROVE_GENESIS_INTERVAL,
            initial_request_delay: TimeDiff::from_millis(20),
            ..Config::default()
        }
    }
}
