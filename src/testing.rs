//! Testing utilities.
//!
//! Deterministic key and block constructors plus recording fakes for the collaborator traits,
//! shared by the test modules across the crate.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    components::packet_handler::HandlerEnv,
    consensus::{CasperError, CasperFactory, DoppelgangerCallback, MultiParentCasper},
    contract_runtime::{ExecutionEngineError, ExecutionEngineService},
    crypto::{
        asymmetric_key::{PublicKey, SecretKey, ValidatorIdentity},
        hash::Digest,
    },
    genesis::{self, GenesisParams, Wallet},
    network::{Blob, Transport, TransportError},
    protocol::Message,
    storage::{BlockStore, DagRepresentation, DagStorage, StorageError},
    types::{Block, BlockHash, Bond, NodeId, Timestamp, TransformEntry},
};

/// Returns a deterministic keypair derived from the given seed.
pub(crate) fn keypair(seed: u8) -> (SecretKey, PublicKey) {
    let secret_key = SecretKey::new_ed25519([seed; SecretKey::ED25519_LENGTH]);
    let public_key = PublicKey::from(&secret_key);
    (secret_key, public_key)
}

/// Returns a deterministic node ID derived from the given seed.
pub(crate) fn node_id(seed: u8) -> NodeId {
    NodeId::new(Digest::from([seed; Digest::LENGTH]))
}

/// The node ID tests use for the local node.
pub(crate) fn local_node_id() -> NodeId {
    node_id(0)
}

/// Genesis parameters with three bonded validators (key seeds 1 to 3) and one funded wallet.
pub(crate) fn genesis_params(shard_id: &str) -> GenesisParams {
    let bonds = (1u8..=3)
        .map(|seed| {
            let (_, public_key) = keypair(seed);
            Bond {
                validator: public_key,
                stake: 100 * seed as u64,
            }
        })
        .collect();
    let (_, wallet_key) = keypair(4);
    GenesisParams {
        bonds,
        wallets: vec![Wallet {
            public_key: wallet_key,
            initial_balance: 1_000,
        }],
        minimum_bond: 1,
        maximum_bond: 10_000,
        has_faucet: false,
        shard_id: shard_id.to_string(),
        deploy_timestamp: Timestamp::from(1_000),
    }
}

/// The deterministic genesis block for [`genesis_params`].
pub(crate) fn genesis_block(shard_id: &str) -> Block {
    genesis::build_genesis(&genesis_params(shard_id))
}

/// A validator identity derived from the given key seed.
pub(crate) fn validator_identity(seed: u8) -> ValidatorIdentity {
    let (secret_key, _) = keypair(seed);
    ValidatorIdentity::new(secret_key)
}

/// A transport that records every streamed blob.
pub(crate) struct RecordingTransport {
    peers: Vec<NodeId>,
    sent: Mutex<Vec<(Vec<NodeId>, Blob)>>,
}

impl RecordingTransport {
    /// Creates a transport reporting the given connected peers.
    pub(crate) fn new(peers: Vec<NodeId>) -> Self {
        RecordingTransport {
            peers,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// All sent messages, decoded, with their target peers.
    pub(crate) fn sent_messages(&self) -> Vec<(Vec<NodeId>, Message)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(peers, blob)| {
                let message =
                    Message::decode(&blob.packet).expect("recorded packet should decode");
                (peers.clone(), message)
            })
            .collect()
    }

    /// The raw packet bytes of every send, for bit-level comparisons.
    pub(crate) fn sent_packets(&self) -> Vec<(Vec<NodeId>, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(peers, blob)| (peers.clone(), blob.packet.content.clone()))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn stream(&self, peers: &[NodeId], blob: Blob) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((peers.to_vec(), blob));
        Ok(())
    }

    async fn connected_peers(&self) -> Vec<NodeId> {
        self.peers.clone()
    }
}

/// An in-memory block store.
#[derive(Default)]
pub(crate) struct InMemBlockStore {
    blocks: Mutex<HashMap<BlockHash, (Block, Vec<TransformEntry>)>>,
}

impl InMemBlockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, hash: &BlockHash) -> bool {
        self.blocks.lock().unwrap().contains_key(hash)
    }
}

#[async_trait]
impl BlockStore for InMemBlockStore {
    async fn put(
        &self,
        hash: BlockHash,
        block: Block,
        transforms: Vec<TransformEntry>,
    ) -> Result<(), StorageError> {
        self.blocks.lock().unwrap().insert(hash, (block, transforms));
        Ok(())
    }

    async fn get_block_message(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError> {
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(hash)
            .map(|(block, _)| block.clone()))
    }
}

/// An in-memory DAG storage always returning an empty representation.
#[derive(Default)]
pub(crate) struct InMemDagStorage;

#[async_trait]
impl DagStorage for InMemDagStorage {
    async fn get_representation(&self) -> Result<DagRepresentation, StorageError> {
        Ok(DagRepresentation::default())
    }
}

/// An execution engine returning scripted transforms and recording the installed bonds.
pub(crate) struct FixedExecutionEngine {
    transforms: Vec<TransformEntry>,
    bonds: Mutex<Option<Vec<Bond>>>,
    fail_effects: bool,
}

impl FixedExecutionEngine {
    pub(crate) fn new(transforms: Vec<TransformEntry>) -> Self {
        FixedExecutionEngine {
            transforms,
            bonds: Mutex::new(None),
            fail_effects: false,
        }
    }

    /// An engine whose effects computation always fails.
    pub(crate) fn failing() -> Self {
        FixedExecutionEngine {
            transforms: vec![],
            bonds: Mutex::new(None),
            fail_effects: true,
        }
    }

    pub(crate) fn installed_bonds(&self) -> Option<Vec<Bond>> {
        self.bonds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionEngineService for FixedExecutionEngine {
    async fn set_bonds(&self, bonds: Vec<Bond>) -> Result<(), ExecutionEngineError> {
        *self.bonds.lock().unwrap() = Some(bonds);
        Ok(())
    }

    async fn effects_for_block(
        &self,
        _block: &Block,
        _dag: &DagRepresentation,
    ) -> Result<Vec<TransformEntry>, ExecutionEngineError> {
        if self.fail_effects {
            return Err(ExecutionEngineError::Engine(
                "scripted effects failure".to_string(),
            ));
        }
        Ok(self.transforms.clone())
    }
}

/// A consensus instance recording added blocks.
pub(crate) struct TestCasper {
    genesis: Block,
    own_key: Option<PublicKey>,
    added: Mutex<Vec<Block>>,
}

impl TestCasper {
    pub(crate) fn added_blocks(&self) -> Vec<Block> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultiParentCasper for TestCasper {
    async fn contains(&self, block: &Block) -> bool {
        self.added
            .lock()
            .unwrap()
            .iter()
            .any(|added| added.hash() == block.hash())
    }

    async fn add_block(
        &self,
        block: Block,
        doppelganger: DoppelgangerCallback,
    ) -> Result<(), CasperError> {
        if let Some(own_key) = &self.own_key {
            doppelganger(&block, own_key);
        }
        self.added.lock().unwrap().push(block);
        Ok(())
    }

    async fn fork_choice_tip(&self) -> Result<Block, CasperError> {
        let added = self.added.lock().unwrap();
        Ok(added.last().cloned().unwrap_or_else(|| self.genesis.clone()))
    }
}

/// A factory handing out [`TestCasper`] instances and recording them.
#[derive(Default)]
pub(crate) struct TestCasperFactory {
    created: Mutex<Vec<Arc<TestCasper>>>,
}

impl TestCasperFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The most recently created instance, if any.
    pub(crate) fn latest(&self) -> Option<Arc<TestCasper>> {
        self.created.lock().unwrap().last().cloned()
    }

    pub(crate) fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl CasperFactory for TestCasperFactory {
    async fn hash_set_casper(
        &self,
        validator: Option<Arc<ValidatorIdentity>>,
        genesis: Block,
        _shard_id: &str,
    ) -> Result<Arc<dyn MultiParentCasper>, CasperError> {
        let casper = Arc::new(TestCasper {
            genesis,
            own_key: validator.map(|identity| identity.public_key),
            added: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(Arc::clone(&casper));
        Ok(casper)
    }
}

/// A full set of fakes wired into a [`HandlerEnv`].
pub(crate) struct TestEnv {
    pub(crate) transport: Arc<RecordingTransport>,
    pub(crate) block_store: Arc<InMemBlockStore>,
    pub(crate) execution_engine: Arc<FixedExecutionEngine>,
    pub(crate) casper_factory: Arc<TestCasperFactory>,
    pub(crate) env: HandlerEnv,
}

/// Builds a test environment whose transport reports the given connected peers.
pub(crate) fn test_env(peers: Vec<NodeId>) -> TestEnv {
    test_env_with_engine(peers, FixedExecutionEngine::new(vec![]))
}

/// Builds a test environment with a specific execution engine fake.
pub(crate) fn test_env_with_engine(
    peers: Vec<NodeId>,
    execution_engine: FixedExecutionEngine,
) -> TestEnv {
    let transport = Arc::new(RecordingTransport::new(peers));
    let block_store = Arc::new(InMemBlockStore::new());
    let dag_storage = Arc::new(InMemDagStorage::default());
    let execution_engine = Arc::new(execution_engine);
    let casper_factory = Arc::new(TestCasperFactory::new());
    let env = HandlerEnv::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&block_store) as Arc<dyn BlockStore>,
        dag_storage as Arc<dyn DagStorage>,
        Arc::clone(&execution_engine) as Arc<dyn ExecutionEngineService>,
        Arc::clone(&casper_factory) as Arc<dyn CasperFactory>,
        local_node_id(),
    );
    TestEnv {
        transport,
        block_store,
        execution_engine,
        casper_factory,
        env,
    }
}
