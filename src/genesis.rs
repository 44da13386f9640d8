//! Genesis input parsing and candidate construction.
//!
//! The genesis ceremony starts from flat input files shared among the committee: a bonds file
//! (`<hex public key> <stake>` per line), a wallets file (`<hex public key>,<initial balance>` per
//! line) and, for bootstrapping nodes, a known-validators file (`<hex public key>` per line).
//! Every committee member parses the same files and must arrive at the same candidate block, so
//! construction is strictly deterministic.

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    crypto::{
        self,
        asymmetric_key::{PublicKey, SecretKey},
        hash,
    },
    types::{Block, BlockHeader, Bond, Timestamp},
    utils::read_file,
};

/// Name of the bonds file written when fresh validator keys are generated.
const BONDS_FILE_NAME: &str = "bonds.txt";

/// Errors arising while assembling genesis inputs.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// Reading an input file failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A key failed to parse.
    #[error("invalid key in genesis input: {0}")]
    Crypto(#[from] crypto::Error),

    /// A bonds-file line did not have the `<hex public key> <stake>` shape.
    #[error("invalid bonds file line: {line:?}")]
    InvalidBond {
        /// The offending line.
        line: String,
    },

    /// A wallets-file line did not have the `<hex public key>,<balance>` shape.
    #[error("invalid wallets file line: {line:?}")]
    InvalidWallet {
        /// The offending line.
        line: String,
    },
}

/// A wallet funded at genesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Wallet {
    pub(crate) public_key: PublicKey,
    pub(crate) initial_balance: u64,
}

/// Everything that determines the genesis candidate.
#[derive(Debug)]
pub(crate) struct GenesisParams {
    pub(crate) bonds: Vec<Bond>,
    pub(crate) wallets: Vec<Wallet>,
    pub(crate) minimum_bond: u64,
    pub(crate) maximum_bond: u64,
    pub(crate) has_faucet: bool,
    pub(crate) shard_id: String,
    pub(crate) deploy_timestamp: Timestamp,
}

/// Parses the contents of a bonds file.
pub(crate) fn parse_bonds(content: &str) -> Result<Vec<Bond>, GenesisError> {
    let mut bonds = Vec::new();
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let mut parts = line.split_whitespace();
        let (key, stake) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(stake), None) => (key, stake),
            _ => {
                return Err(GenesisError::InvalidBond {
                    line: line.to_string(),
                })
            }
        };
        let validator = PublicKey::from_hex(key)?;
        let stake = stake.parse().map_err(|_| GenesisError::InvalidBond {
            line: line.to_string(),
        })?;
        bonds.push(Bond { validator, stake });
    }
    Ok(bonds)
}

/// Parses the contents of a wallets file.
pub(crate) fn parse_wallets(content: &str) -> Result<Vec<Wallet>, GenesisError> {
    let mut wallets = Vec::new();
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let mut parts = line.trim().split(',');
        let (key, balance) = match (parts.next(), parts.next()) {
            (Some(key), Some(balance)) => (key, balance),
            _ => {
                return Err(GenesisError::InvalidWallet {
                    line: line.to_string(),
                })
            }
        };
        let public_key = PublicKey::from_hex(key.trim())?;
        let initial_balance = balance
            .trim()
            .parse()
            .map_err(|_| GenesisError::InvalidWallet {
                line: line.to_string(),
            })?;
        wallets.push(Wallet {
            public_key,
            initial_balance,
        });
    }
    Ok(wallets)
}

/// Parses a known-validators file: one hex-encoded public key per line.
pub(crate) fn parse_known_validators(content: &str) -> Result<HashSet<PublicKey>, GenesisError> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| PublicKey::from_hex(line).map_err(GenesisError::Crypto))
        .collect()
}

/// Returns the genesis bonds.
///
/// If a bonds file is given it is read and parsed. Otherwise `num_validators` fresh keys are
/// generated and bonded with ascending stakes; the resulting bonds file and the secret keys are
/// written under `genesis_path` so the operator can distribute them to the committee.
pub(crate) fn get_bonds(
    bonds_file: Option<&PathBuf>,
    num_validators: usize,
    minimum_bond: u64,
    genesis_path: &Path,
) -> Result<Vec<Bond>, GenesisError> {
    if let Some(path) = bonds_file {
        let content = read_file(path)?;
        return parse_bonds(&content);
    }

    warn!(
        %num_validators,
        "no bonds file given, generating fresh validator keys"
    );
    fs::create_dir_all(genesis_path)?;
    let mut bonds = Vec::with_capacity(num_validators);
    let mut bonds_content = String::new();
    for index in 0..num_validators {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);
        let stake = minimum_bond + index as u64;
        bonds_content.push_str(&format!("{} {}\n", public_key.to_hex(), stake));
        fs::write(
            genesis_path.join(format!("{}.sk", public_key.to_hex())),
            hex::encode(secret_key.as_secret_slice()),
        )?;
        bonds.push(Bond {
            validator: public_key,
            stake,
        });
    }
    fs::write(genesis_path.join(BONDS_FILE_NAME), bonds_content)?;
    Ok(bonds)
}

/// Returns the genesis wallets; an absent wallets file means an empty initial distribution.
pub(crate) fn get_wallets(wallets_file: Option<&PathBuf>) -> Result<Vec<Wallet>, GenesisError> {
    match wallets_file {
        Some(path) => {
            let content = read_file(path)?;
            parse_wallets(&content)
        }
        None => {
            info!("no wallets file given, starting with an empty initial distribution");
            Ok(Vec::new())
        }
    }
}

/// Deterministically constructs the genesis candidate block from the given parameters.
pub(crate) fn build_genesis(params: &GenesisParams) -> Block {
    // The real global state is produced by the execution engine; what the ceremony needs is a
    // state digest every committee member computes identically from the shared inputs.
    let wallet_inputs: Vec<(Vec<u8>, u64)> = params
        .wallets
        .iter()
        .map(|wallet| (wallet.public_key.as_bytes().to_vec(), wallet.initial_balance))
        .collect();
    let bond_inputs: Vec<(Vec<u8>, u64)> = params
        .bonds
        .iter()
        .map(|bond| (bond.validator.as_bytes().to_vec(), bond.stake))
        .collect();
    let state_input = bincode::serialize(&(
        &bond_inputs,
        &wallet_inputs,
        params.minimum_bond,
        params.maximum_bond,
        params.has_faucet,
    ))
    .expect("should serialize genesis state input");
    let state_hash = hash::hash(state_input);

    Block::new(BlockHeader {
        parent_hashes: vec![],
        timestamp: params.deploy_timestamp,
        shard_id: params.shard_id.clone(),
        state_hash,
        sender: None,
        bonds: params.bonds.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn sample_params() -> GenesisParams {
        let bonds = (1..=3)
            .map(|seed| {
                let (_, public_key) = testing::keypair(seed);
                Bond {
                    validator: public_key,
                    stake: 100 * seed as u64,
                }
            })
            .collect();
        GenesisParams {
            bonds,
            wallets: vec![],
            minimum_bond: 1,
            maximum_bond: 10_000,
            has_faucet: false,
            shard_id: "casper-test".to_string(),
            deploy_timestamp: Timestamp::from(1_000),
        }
    }

    #[test]
    fn bonds_file_roundtrip() {
        let params = sample_params();
        let content: String = params
            .bonds
            .iter()
            .map(|bond| format!("{} {}\n", bond.validator.to_hex(), bond.stake))
            .collect();
        assert_eq!(params.bonds, parse_bonds(&content).unwrap());
    }

    #[test]
    fn rejects_malformed_bonds_line() {
        assert!(parse_bonds("deadbeef").is_err());
        assert!(parse_bonds("nothex 100").is_err());
        let (_, public_key) = testing::keypair(1);
        assert!(parse_bonds(&format!("{} notanumber", public_key.to_hex())).is_err());
        assert!(parse_bonds(&format!("{} 100 extra", public_key.to_hex())).is_err());
    }

    #[test]
    fn wallets_file_roundtrip() {
        let (_, public_key) = testing::keypair(4);
        let content = format!("{},5000\n\n{} , 100\n", public_key.to_hex(), public_key.to_hex());
        let wallets = parse_wallets(&content).unwrap();
        assert_eq!(2, wallets.len());
        assert_eq!(5_000, wallets[0].initial_balance);
        assert_eq!(100, wallets[1].initial_balance);
    }

    #[test]
    fn known_validators_are_parsed_per_line() {
        let (_, key_one) = testing::keypair(1);
        let (_, key_two) = testing::keypair(2);
        let content = format!("{}\n\n  {}  \n", key_one.to_hex(), key_two.to_hex());
        let parsed = parse_known_validators(&content).unwrap();
        assert_eq!(2, parsed.len());
        assert!(parsed.contains(&key_one));
        assert!(parsed.contains(&key_two));
    }

    #[test]
    fn genesis_is_deterministic() {
        let params = sample_params();
        let block = build_genesis(&params);
        let again = build_genesis(&sample_params());
        assert_eq!(block, again);
        assert!(block.is_genesis());
        assert_eq!("casper-test", block.header().shard_id);
    }

    #[test]
    fn genesis_depends_on_bonds() {
        let params = sample_params();
        let mut altered = sample_params();
        altered.bonds[0].stake += 1;
        assert_ne!(build_genesis(&params), build_genesis(&altered));
    }

    #[test]
    fn generated_bonds_are_written_to_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bonds = get_bonds(None, 3, 10, temp_dir.path()).unwrap();
        assert_eq!(3, bonds.len());
        assert_eq!(10, bonds[0].stake);

        let written = fs::read_to_string(temp_dir.path().join(BONDS_FILE_NAME)).unwrap();
        assert_eq!(bonds, parse_bonds(&written).unwrap());
        // One secret-key file per generated validator.
        for bond in &bonds {
            assert!(temp_dir
                .path()
                .join(format!("{}.sk", bond.validator.to_hex()))
                .exists());
        }
    }
}
