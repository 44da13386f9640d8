//! The packet handler: the node's lifecycle state machine.
//!
//! The [`PacketHandler`] is the single entry point for protocol packets delivered by the
//! transport layer. It decodes each packet, loads the currently active handler state from an
//! atomic cell and dispatches by message kind. The handler state encodes the node's lifecycle
//! phase:
//!
//! - `GenesisValidator` signs circulated genesis candidates and waits for the approved block;
//! - `Standalone` constructs the genesis candidate and collects approvals;
//! - `Bootstrap` requests the approved block from its peers;
//! - `ApprovedBlockReceived` is the terminal, fully participating state.
//!
//! The first three states all terminate at `ApprovedBlockReceived`. The `GenesisValidator` and
//! `Bootstrap` states transition when a valid `ApprovedBlock` packet arrives; the `Standalone`
//! state is promoted by a background timing loop once its own ceremony completes.

mod approved_block_received;
mod bootstrap;
mod config;
mod error;
mod genesis_validator;
mod metrics;
mod standalone;
mod transition;

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    iter,
    sync::{Arc, RwLock},
};

use prometheus::Registry;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    components::{approve_block::ApproveBlockProtocol, block_approver::BlockApproverProtocol},
    consensus::{CasperFactory, MultiParentCasper},
    contract_runtime::ExecutionEngineService,
    crypto::asymmetric_key::{PublicKey, ValidatorIdentity},
    genesis::{self, GenesisParams},
    network::{self, Transport},
    protocol::{
        ApprovedBlockRequest, BlockRequest, Message, NoApprovedBlockAvailable, Packet,
    },
    storage::{BlockStore, DagStorage},
    types::{
        ApprovedBlock, ApprovedBlockCandidate, ApprovedBlockWithTransforms, Block, BlockApproval,
        NodeId, Timestamp, UnapprovedBlock,
    },
    utils::{read_file, SingleSlot},
};

use approved_block_received::ApprovedBlockReceivedHandler;
use bootstrap::BootstrapHandler;
pub use config::{Config, Role};
pub use error::Error;
use genesis_validator::GenesisValidatorHandler;
use metrics::PacketHandlerMetrics;
use standalone::StandaloneHandler;

/// The collaborators and shared slots the handler states operate on.
///
/// Cheap to clone; every field is behind an `Arc`.
#[derive(Clone)]
pub struct HandlerEnv {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) block_store: Arc<dyn BlockStore>,
    pub(crate) dag_storage: Arc<dyn DagStorage>,
    pub(crate) execution_engine: Arc<dyn ExecutionEngineService>,
    pub(crate) casper_factory: Arc<dyn CasperFactory>,
    pub(crate) last_approved_block: Arc<SingleSlot<Arc<ApprovedBlockWithTransforms>>>,
    pub(crate) casper_ref: Arc<SingleSlot<Arc<dyn MultiParentCasper>>>,
    pub(crate) local_node: NodeId,
}

impl HandlerEnv {
    /// Bundles the given collaborators, creating empty shared slots.
    pub fn new(
        transport: Arc<dyn Transport>,
        block_store: Arc<dyn BlockStore>,
        dag_storage: Arc<dyn DagStorage>,
        execution_engine: Arc<dyn ExecutionEngineService>,
        casper_factory: Arc<dyn CasperFactory>,
        local_node: NodeId,
    ) -> Self {
        HandlerEnv {
            transport,
            block_store,
            dag_storage,
            execution_engine,
            casper_factory,
            last_approved_block: Arc::new(SingleSlot::empty()),
            casper_ref: Arc::new(SingleSlot::empty()),
            local_node,
        }
    }

    /// The consensus instance, once the node holds an approved block.
    pub fn casper(&self) -> Option<Arc<dyn MultiParentCasper>> {
        self.casper_ref.get()
    }

    /// The last approved block with its transforms, once populated.
    pub fn last_approved_block(&self) -> Option<Arc<ApprovedBlockWithTransforms>> {
        self.last_approved_block.get()
    }
}

/// The atomic cell holding the currently active handler state.
///
/// Readers clone the inner `Arc` under a short-lived guard; the lock is never held across a
/// suspension point. After construction only the dispatcher writes, plus the approval timing
/// loop, exactly once, for the standalone promotion.
pub(crate) struct HandlerCell {
    inner: RwLock<Arc<HandlerState>>,
}

impl HandlerCell {
    fn new(initial: HandlerState) -> Self {
        HandlerCell {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    pub(crate) fn load(&self) -> Arc<HandlerState> {
        Arc::clone(&self.inner.read().expect("handler cell lock poisoned"))
    }

    pub(crate) fn store(&self, state: Arc<HandlerState>) {
        *self.inner.write().expect("handler cell lock poisoned") = state;
    }
}

/// The lifecycle states of the node, each with its private state.
pub(crate) enum HandlerState {
    /// Waiting to sign the circulated genesis candidate.
    GenesisValidator(GenesisValidatorHandler),
    /// Constructing the genesis block and collecting approvals.
    Standalone(StandaloneHandler),
    /// Catching up; requesting the approved block from peers.
    Bootstrap(BootstrapHandler),
    /// Fully participating.
    ApprovedBlockReceived(ApprovedBlockReceivedHandler),
}

impl HandlerState {
    fn name(&self) -> &'static str {
        match self {
            HandlerState::GenesisValidator(_) => "GenesisValidator",
            HandlerState::Standalone(_) => "Standalone",
            HandlerState::Bootstrap(_) => "Bootstrap",
            HandlerState::ApprovedBlockReceived(_) => "ApprovedBlockReceived",
        }
    }

    async fn handle_block_message(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
        block: Block,
    ) -> Result<(), Error> {
        match self {
            HandlerState::ApprovedBlockReceived(handler) => {
                handler.handle_block_message(env, peer, block).await
            }
            _ => {
                debug!(state = self.name(), %block, "ignoring block message");
                Ok(())
            }
        }
    }

    async fn handle_block_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
        request: BlockRequest,
    ) -> Result<(), Error> {
        match self {
            HandlerState::ApprovedBlockReceived(handler) => {
                handler.handle_block_request(env, peer, request).await
            }
            _ => {
                debug!(state = self.name(), "ignoring block request");
                Ok(())
            }
        }
    }

    async fn handle_fork_choice_tip_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
    ) -> Result<(), Error> {
        match self {
            HandlerState::ApprovedBlockReceived(handler) => {
                handler.handle_fork_choice_tip_request(env, peer).await
            }
            _ => {
                debug!(state = self.name(), "ignoring fork choice tip request");
                Ok(())
            }
        }
    }

    async fn handle_approved_block(
        &self,
        env: &HandlerEnv,
        approved_block: ApprovedBlock,
    ) -> Result<Option<Arc<dyn MultiParentCasper>>, Error> {
        match self {
            HandlerState::GenesisValidator(handler) => {
                handler.handle_approved_block(env, approved_block).await
            }
            HandlerState::Bootstrap(handler) => {
                handler.handle_approved_block(env, approved_block).await
            }
            HandlerState::Standalone(_) => {
                // A standalone node constructs its own approved block; externally delivered ones
                // are not accepted.
                debug!("ignoring approved block in standalone mode");
                Ok(None)
            }
            HandlerState::ApprovedBlockReceived(_) => {
                // Terminal state; re-approval is a possible future extension.
                debug!("ignoring approved block, already received one");
                Ok(None)
            }
        }
    }

    async fn handle_approved_block_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
        request: ApprovedBlockRequest,
    ) -> Result<(), Error> {
        match self {
            HandlerState::ApprovedBlockReceived(handler) => {
                handler.handle_approved_block_request(env, peer, request).await
            }
            _ => {
                info!(
                    state = self.name(),
                    %peer,
                    "no approved block available yet, replying so"
                );
                let reply = Message::NoApprovedBlockAvailable(NoApprovedBlockAvailable {
                    identifier: request.identifier,
                    node_id: env.local_node.to_string(),
                });
                network::send_to_peer(&env.transport, env.local_node, peer, &reply).await;
                Ok(())
            }
        }
    }

    async fn handle_unapproved_block(
        &self,
        _env: &HandlerEnv,
        peer: NodeId,
        unapproved: UnapprovedBlock,
    ) -> Result<(), Error> {
        match self {
            HandlerState::GenesisValidator(handler) => {
                handler
                    .approver
                    .unapproved_block_received(peer, unapproved)
                    .await;
                Ok(())
            }
            _ => {
                debug!(state = self.name(), "ignoring unapproved block");
                Ok(())
            }
        }
    }

    async fn handle_block_approval(&self, approval: BlockApproval) -> Result<(), Error> {
        match self {
            HandlerState::Standalone(handler) => {
                handler.protocol.add_approval(approval);
                Ok(())
            }
            _ => {
                debug!(state = self.name(), "ignoring block approval");
                Ok(())
            }
        }
    }

    fn handle_no_approved_block_available(&self, reply: &NoApprovedBlockAvailable) {
        info!(node = %reply.node_id, "peer has no approved block available");
    }
}

impl Display for HandlerState {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{}", self.name())
    }
}

/// Publishes the consensus instance, installs the terminal handler state and announces the
/// transition by requesting the fork choice tip from all connected peers.
///
/// All side effects of the preceding transition (block store put, last-approved-block set) have
/// already happened when this runs, so a dispatcher task observing the new state also observes
/// them.
pub(crate) async fn install_approved_block_received(
    cell: &HandlerCell,
    env: &HandlerEnv,
    metrics: Arc<PacketHandlerMetrics>,
    casper: Arc<dyn MultiParentCasper>,
    approved_block: ApprovedBlock,
) {
    env.casper_ref.set(Arc::clone(&casper));
    let handler = ApprovedBlockReceivedHandler::new(casper, approved_block, metrics);
    cell.store(Arc::new(HandlerState::ApprovedBlockReceived(handler)));
    info!("making the transition to the ApprovedBlockReceived state");
    network::broadcast(&env.transport, env.local_node, &Message::ForkChoiceTipRequest).await;
}

/// The packet-handling state machine.
pub struct PacketHandler {
    cell: Arc<HandlerCell>,
    env: HandlerEnv,
    metrics: Arc<PacketHandlerMetrics>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl PacketHandler {
    /// Creates the packet handler in the initial state selected by the configured role, and
    /// spawns the role's background tasks.
    ///
    /// For the standalone role this reads the genesis input files, installs the bonds in the
    /// execution engine, constructs the genesis candidate and starts the approval ceremony; for
    /// the approve-genesis role it derives the expected candidate from the same inputs.
    pub async fn new(
        config: Config,
        identity: Option<ValidatorIdentity>,
        env: HandlerEnv,
        registry: &Registry,
    ) -> Result<PacketHandler, Error> {
        let metrics = Arc::new(PacketHandlerMetrics::new(registry)?);
        let identity = identity.map(Arc::new);

        let (initial_state, approve_protocol) = match config.role {
            Role::ApproveGenesis => {
                let identity = identity
                    .clone()
                    .ok_or(Error::MissingValidatorIdentity { role: config.role })?;
                let params = load_genesis_params(&config)?;
                let approver = BlockApproverProtocol::new(
                    Arc::clone(&identity),
                    &params,
                    config.required_sigs,
                    Arc::clone(&env.transport),
                    env.local_node,
                );
                let handler = GenesisValidatorHandler {
                    identity,
                    shard_id: config.shard_id.clone(),
                    approver,
                };
                (HandlerState::GenesisValidator(handler), None)
            }
            Role::Standalone => {
                let params = load_genesis_params(&config)?;
                env.execution_engine.set_bonds(params.bonds.clone()).await?;
                let genesis_block = genesis::build_genesis(&params);
                let dag = env.dag_storage.get_representation().await?;
                let transforms = env
                    .execution_engine
                    .effects_for_block(&genesis_block, &dag)
                    .await?;
                let candidate = ApprovedBlockCandidate {
                    block: genesis_block,
                    required_sigs: config.required_sigs,
                };
                let protocol = Arc::new(ApproveBlockProtocol::new(
                    candidate,
                    transforms,
                    config.approve_genesis_duration,
                    config.approve_genesis_interval,
                    Arc::clone(&env.transport),
                    env.local_node,
                    Arc::clone(&env.last_approved_block),
                ));
                let handler = StandaloneHandler {
                    protocol: Arc::clone(&protocol),
                };
                (HandlerState::Standalone(handler), Some(protocol))
            }
            Role::Default => {
                let known_validators = match &config.known_validators_file {
                    Some(path) => genesis::parse_known_validators(
                        &read_file(path).map_err(genesis::GenesisError::from)?,
                    )?,
                    None => {
                        warn!(
                            "no known validators configured, only unsigned approved blocks will \
                             validate"
                        );
                        HashSet::new()
                    }
                };
                let handler = BootstrapHandler {
                    shard_id: config.shard_id.clone(),
                    identity: identity.clone(),
                    known_validators,
                };
                (HandlerState::Bootstrap(handler), None)
            }
        };

        info!(state = initial_state.name(), shard = %config.shard_id, "packet handler starting");
        let cell = Arc::new(HandlerCell::new(initial_state));

        let mut background_tasks = Vec::new();
        if let Some(protocol) = approve_protocol {
            background_tasks.push(tokio::spawn({
                let protocol = Arc::clone(&protocol);
                async move { protocol.run().await }
            }));
            background_tasks.push(tokio::spawn(standalone::run_approval_loop(
                Arc::clone(&cell),
                env.clone(),
                Arc::clone(&metrics),
                identity.clone(),
                config.shard_id.clone(),
                config.approve_genesis_interval,
            )));
        }
        if config.role == Role::Default {
            background_tasks.push(tokio::spawn(bootstrap::run_approved_block_requester(
                Arc::clone(&cell),
                env.clone(),
                config.initial_request_delay,
            )));
        }

        Ok(PacketHandler {
            cell,
            env,
            metrics,
            background_tasks,
        })
    }

    /// Handles an incoming packet, logging any handler error.
    ///
    /// This is the transport-facing entry point: a failing handler never stops packet service.
    pub async fn handle_packet(&self, peer: NodeId, packet: Packet) {
        if let Err(error) = self.handle(peer, packet).await {
            warn!(%peer, %error, "failed to handle incoming packet");
        }
    }

    /// Decodes a packet and dispatches it to the currently active handler state.
    ///
    /// Packets that decode to no known message are not for this handler and are ignored. When a
    /// handler returns a new consensus instance for an approved block, the terminal state is
    /// installed and the transition announced.
    pub async fn handle(&self, peer: NodeId, packet: Packet) -> Result<(), Error> {
        let message = match Message::decode(&packet) {
            Some(message) => message,
            None => return Ok(()),
        };
        let handler = self.cell.load();
        match message {
            Message::BlockMessage(block) => {
                handler.handle_block_message(&self.env, peer, *block).await
            }
            Message::BlockRequest(request) => {
                handler.handle_block_request(&self.env, peer, request).await
            }
            Message::ForkChoiceTipRequest => {
                handler.handle_fork_choice_tip_request(&self.env, peer).await
            }
            Message::ApprovedBlock(approved_block) => {
                let approved_block = *approved_block;
                if let Some(casper) = handler
                    .handle_approved_block(&self.env, approved_block.clone())
                    .await?
                {
                    install_approved_block_received(
                        &self.cell,
                        &self.env,
                        Arc::clone(&self.metrics),
                        casper,
                        approved_block,
                    )
                    .await;
                }
                Ok(())
            }
            Message::ApprovedBlockRequest(request) => {
                handler
                    .handle_approved_block_request(&self.env, peer, request)
                    .await
            }
            Message::UnapprovedBlock(unapproved) => {
                handler
                    .handle_unapproved_block(&self.env, peer, *unapproved)
                    .await
            }
            Message::BlockApproval(approval) => handler.handle_block_approval(approval).await,
            Message::NoApprovedBlockAvailable(reply) => {
                handler.handle_no_approved_block_available(&reply);
                Ok(())
            }
        }
    }

    /// The name of the currently active lifecycle state.
    pub fn lifecycle_state(&self) -> &'static str {
        self.cell.load().name()
    }
}

impl Drop for PacketHandler {
    fn drop(&mut self) {
        for task in &self.background_tasks {
            task.abort();
        }
    }
}

/// Reads the genesis input files named by the configuration into construction parameters.
fn load_genesis_params(config: &Config) -> Result<GenesisParams, Error> {
    let bonds = genesis::get_bonds(
        config.bonds_file.as_ref(),
        config.num_validators,
        config.minimum_bond,
        &config.genesis_path,
    )?;
    let wallets = genesis::get_wallets(config.wallets_file.as_ref())?;
    let deploy_timestamp = config.deploy_timestamp.unwrap_or_else(|| {
        let now = Timestamp::now();
        warn!(%now, "no deploy timestamp given, using the current time");
        now
    });
    Ok(GenesisParams {
        bonds,
        wallets,
        minimum_bond: config.minimum_bond,
        maximum_bond: config.maximum_bond,
        has_faucet: config.has_faucet,
        shard_id: config.shard_id.clone(),
        deploy_timestamp,
    })
}

/// Builds the trusted validator set for a genesis validator: only its own key.
fn self_validator_set(identity: &ValidatorIdentity) -> HashSet<PublicKey> {
    iter::once(identity.public_key).collect()
}
