//! Client API for the consensus message store.
//!
//! The message DAG and the per-era validator weight tables are owned by external storage; this
//! crate defines the read-only contract the fork-choice core consumes. Implementations must make
//! sure a single query (a sequence of point lookups between two suspension points of the same
//! caller) observes one causally-consistent snapshot of the DAG: a message must never be visible
//! through one lookup and invisible through a later one within the same query.

use hw_core_primitives::hashes::MessageHash;
use hw_core_primitives::tick::Tick;
use hw_core_primitives::validator::{ValidatorIndex, Weight};
use std::collections::BTreeMap;

/// What kind of consensus message this is
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageKind {
    /// A block proposal; `parent` is the main parent, `None` for the genesis block
    Block {
        /// Main parent block, `None` for the genesis block
        parent: Option<MessageHash>,
    },
    /// A ballot citing an existing block without proposing a new one
    Ballot {
        /// The block this ballot supports
        target: MessageHash,
    },
}

/// A consensus message (block or ballot) as stored in the message DAG
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Message {
    /// Content hash of the message
    pub hash: MessageHash,
    /// Creator of the message
    pub validator: ValidatorIndex,
    /// Key block hash of the era the message belongs to
    pub era_id: MessageHash,
    /// Round tick the message was created in
    pub round_tick: Tick,
    /// Hashes of prior messages this message acknowledges
    pub justifications: Vec<MessageHash>,
    /// Block or ballot specifics
    pub kind: MessageKind,
}

impl Message {
    /// The block this message votes for: the message itself if it is a block, the target if it is
    /// a ballot
    #[inline]
    pub fn vote(&self) -> MessageHash {
        match self.kind {
            MessageKind::Block { .. } => self.hash,
            MessageKind::Ballot { target } => target,
        }
    }
}

/// Era metadata needed by fork choice
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EraInfo {
    /// Hash of the key block identifying this era
    pub key_block: MessageHash,
    /// Key block of the parent era, `None` only for the genesis era
    pub parent_key_block: Option<MessageHash>,
    /// First tick of the era
    pub start_tick: Tick,
    /// First tick no longer part of the era
    pub end_tick: Tick,
    /// Stake weight per validator active in this era; `BTreeMap` keeps iteration deterministic
    pub validators: BTreeMap<ValidatorIndex, Weight>,
}

/// Error for [`MessageStore`]
#[derive(Debug, thiserror::Error)]
pub enum MessageStoreError {
    /// Storage backend error
    #[error("Storage backend error: {error}")]
    Backend {
        /// Underlying storage error
        #[from]
        error: anyhow::Error,
    },
}

/// Read-only access to the message DAG and era metadata.
///
/// "Not found" is `Ok(None)` (or an empty collection), not an error; callers decide whether a
/// missing entry is a contract violation.
pub trait MessageStore: Send + Sync {
    /// Look up a message by its content hash
    fn message(
        &self,
        hash: &MessageHash,
    ) -> impl Future<Output = Result<Option<Message>, MessageStoreError>> + Send;

    /// Look up era metadata by the era's key block hash
    fn era(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<Option<EraInfo>, MessageStoreError>> + Send;

    /// Latest message per validator within the era identified by `key_block`.
    ///
    /// At most one message per validator; which message is "latest" for an equivocating validator
    /// is the store's choice but must be stable for the duration of a query.
    fn latest_messages(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<Vec<Message>, MessageStoreError>> + Send;

    /// Eras whose parent era is the one identified by `key_block`
    fn child_eras(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<Vec<EraInfo>, MessageStoreError>> + Send;
}
