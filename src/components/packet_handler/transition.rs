use std::{collections::HashSet, sync::Arc};

use tracing::info;

use crate::{
    consensus::MultiParentCasper,
    crypto::asymmetric_key::{PublicKey, ValidatorIdentity},
    types::{ApprovedBlock, ApprovedBlockWithTransforms},
    validation,
};

use super::{Error, HandlerEnv};

/// Validates an incoming approved block and, if it passes, persists it and constructs the
/// consensus instance.
///
/// On success the returned instance signals the caller to install the terminal handler state;
/// all writes performed here happen before that installation. A validation rejection leaves all
/// state untouched; storage and execution failures propagate and equally prevent the transition.
pub(super) async fn on_approved_block(
    env: &HandlerEnv,
    approved_block: ApprovedBlock,
    trusted: &HashSet<PublicKey>,
    identity: Option<Arc<ValidatorIdentity>>,
    shard_id: &str,
) -> Result<Option<Arc<dyn MultiParentCasper>>, Error> {
    if !validation::approved_block(&approved_block, trusted) {
        info!(%approved_block, "invalid ApprovedBlock received; refusing to add");
        return Ok(None);
    }
    info!(%approved_block, "valid ApprovedBlock received");

    // TODO: feed the bonds of the approved block into the execution engine here; they are
    // currently only installed from local configuration on standalone startup.
    let block = approved_block.candidate.block.clone();
    let dag = env.dag_storage.get_representation().await?;
    let transforms = env.execution_engine.effects_for_block(&block, &dag).await?;
    env.block_store
        .put(*block.hash(), block.clone(), transforms.clone())
        .await?;
    env.last_approved_block
        .set(Arc::new(ApprovedBlockWithTransforms {
            approved_block,
            transforms,
        }));

    let casper = env
        .casper_factory
        .hash_set_casper(identity, block, shard_id)
        .await?;
    Ok(Some(casper))
}
