//! Deterministic fork choice over the consensus message DAG.
//!
//! Fork choice answers "which block is canonical" for the era identified by a key block: a
//! top-down, weight-maximizing descent from the key block through the block tree, continued
//! era-by-era through each switch block with the next era's validator weights, until no further
//! descendant messages exist. Determinism is the protocol's core safety property: identical
//! inputs (DAG contents and weight tables) must yield an identical result on every honest node,
//! so every collection iterated here is ordered, weights are compared as integers and the
//! tie-break between equally weighted children is fixed (lowest content hash).
//!
//! [`DagForkChoice`] consults the message store afresh on every query;
//! [`CachingForkChoiceManager`](manager::CachingForkChoiceManager) adds per-era memoization and
//! the [`ForkChoiceManager::update_latest_message()`] notification contract.

#![warn(rust_2018_idioms, missing_debug_implementations, missing_docs)]

mod descent;
pub mod manager;

use crate::descent::{Descent, LatestMessageSource};
use hw_client_api::{Message, MessageStore, MessageStoreError};
use hw_core_primitives::hashes::MessageHash;

/// Error for [`ForkChoice`] and [`ForkChoiceManager`]
#[derive(Debug, thiserror::Error)]
pub enum ForkChoiceError {
    /// The key block identifying the era is not known to the store; the caller supplied an
    /// invalid anchor
    #[error("Unknown key block: {key_block}")]
    UnknownKeyBlock {
        /// Key block hash that was not found
        key_block: MessageHash,
    },
    /// A message referenced during the descent is not known to the store
    #[error("Unknown message: {hash}")]
    UnknownMessage {
        /// Message hash that was not found
        hash: MessageHash,
    },
    /// A justification belongs to an era unrelated to the anchor era; caller contract violation
    #[error("Justification {hash} belongs to era {era} unrelated to the anchor era")]
    ForeignJustification {
        /// The offending justification hash
        hash: MessageHash,
        /// The era the justification belongs to
        era: MessageHash,
    },
    /// A vote resolved to a message that is not a block; the DAG is malformed
    #[error("Vote target {hash} is not a block")]
    InvalidVoteTarget {
        /// The non-block message hash that was voted for
        hash: MessageHash,
    },
    /// Message store error
    #[error("Message store error: {error}")]
    Store {
        /// Underlying store error
        #[from]
        error: MessageStoreError,
    },
}

/// The canonical block chosen by fork choice together with the latest messages that justified
/// the choice (one per validator per era traversed), ordered by message hash.
///
/// Produced fresh per query; the justification set is what a new block built on this choice
/// cites.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ForkChoiceResult {
    /// The chosen canonical block
    pub block: MessageHash,
    /// Latest messages considered along every traversed era, ordered by message hash
    pub justifications: Vec<Message>,
}

/// Deterministic fork choice.
///
/// Both entry points guarantee: identical inputs (DAG snapshot and weight tables) yield an
/// identical [`ForkChoiceResult`] on any honest node, regardless of unrelated concurrent
/// read-only queries.
pub trait ForkChoice: Send + Sync {
    /// Canonical block for the era identified by `key_block`, based on all latest messages known
    /// to the store
    fn from_key_block(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send;

    /// Canonical block for the era identified by `key_block`, seeded from an explicit set of
    /// justification hashes instead of the store's latest-message view.
    ///
    /// Used to validate that an existing block's main parent is consistent with its own
    /// justifications and to pick a response target for a directly-addressed message. The caller
    /// is responsible for supplying the correct era anchor; every justification must belong to
    /// the anchor era or an era lineage-related to it.
    fn from_justifications(
        &self,
        key_block: &MessageHash,
        justifications: &[MessageHash],
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send;
}

/// [`ForkChoice`] extended with the cross-era update notification.
///
/// A descendant era's fork choice is a function of ancestor-era latest messages it has no
/// independent way to observe; whoever routes incoming messages must announce them to every
/// affected era through [`ForkChoiceManager::update_latest_message()`].
pub trait ForkChoiceManager: ForkChoice {
    /// Inform the fork-choice state scoped to the era identified by `key_block` that `message`
    /// (typically from an ancestor era) must be taken into account going forward.
    ///
    /// The update is applied before any subsequent query for that era is served; a query issued
    /// strictly before the update may legitimately miss it, but never observes it partially.
    fn update_latest_message(
        &self,
        key_block: &MessageHash,
        message: Message,
    ) -> impl Future<Output = Result<(), ForkChoiceError>> + Send;
}

/// Stateless fork choice that consults the message store afresh on every query
#[derive(Debug, Clone)]
pub struct DagForkChoice<S> {
    store: S,
}

impl<S> DagForkChoice<S> {
    /// Create new instance
    #[inline]
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> ForkChoice for DagForkChoice<S>
where
    S: MessageStore,
{
    fn from_key_block(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send {
        let key_block = *key_block;
        async move {
            Descent::new(&self.store, LatestMessageSource::Store { overlay: None })
                .execute(&key_block)
                .await
        }
    }

    fn from_justifications(
        &self,
        key_block: &MessageHash,
        justifications: &[MessageHash],
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send {
        let key_block = *key_block;
        async move {
            let seed = descent::resolve_justifications(&self.store, &key_block, justifications)
                .await?;
            Descent::new(&self.store, LatestMessageSource::Justifications(&seed))
                .execute(&key_block)
                .await
        }
    }
}
