//! Per-era caching fork-choice manager.
//!
//! Each era gets a memo cell in an era-keyed arena. A cell holds the latest messages announced
//! for that era's fork choice (including ancestor-era messages the era cannot observe on its
//! own), a version counter and the memoized result of the last [`ForkChoice::from_key_block()`]
//! query. Updates and queries on one era are ordered through the cell's lock, but the lock is
//! never held across a store suspension point: a query snapshots the cell, runs the descent
//! unlocked and installs its memo only if no update intervened. A query therefore observes an
//! update entirely or not at all, never partially.

use crate::descent::{Descent, LatestByEra, LatestMessageSource, insert_latest};
use crate::{ForkChoice, ForkChoiceError, ForkChoiceManager, ForkChoiceResult, descent};
use hw_client_api::{Message, MessageStore};
use hw_core_primitives::hashes::MessageHash;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct EraCellInner {
    /// Bumped on every update; a memo computed against an older version is discarded
    version: u64,
    /// Latest messages announced for this era's fork choice, keyed by the era they belong to
    overlay: LatestByEra,
    memo: Option<ForkChoiceResult>,
}

#[derive(Debug, Default)]
struct EraCell {
    inner: Mutex<EraCellInner>,
}

/// [`ForkChoiceManager`] with per-era memoization on top of a [`MessageStore`].
///
/// Memoization is sound as long as every DAG append that should influence an era's fork choice
/// is announced to that era through [`ForkChoiceManager::update_latest_message()`]; that routing
/// is the era supervisor's job, outside this crate.
#[derive(Debug)]
pub struct CachingForkChoiceManager<S> {
    store: S,
    eras: RwLock<HashMap<MessageHash, Arc<EraCell>>>,
}

impl<S> CachingForkChoiceManager<S> {
    /// Create new instance
    pub fn new(store: S) -> Self {
        Self {
            store,
            eras: RwLock::new(HashMap::new()),
        }
    }

    fn cell(&self, key_block: &MessageHash) -> Arc<EraCell> {
        if let Some(cell) = self.eras.read().get(key_block) {
            return Arc::clone(cell);
        }

        Arc::clone(self.eras.write().entry(*key_block).or_default())
    }
}

impl<S> ForkChoice for CachingForkChoiceManager<S>
where
    S: MessageStore,
{
    fn from_key_block(
        &self,
        key_block: &MessageHash,
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send {
        let key_block = *key_block;
        async move {
            let cell = self.cell(&key_block);

            let (overlay, version) = {
                let inner = cell.inner.lock();
                if let Some(memo) = &inner.memo {
                    trace!(%key_block, "Fork choice served from memo");
                    return Ok(memo.clone());
                }
                (inner.overlay.clone(), inner.version)
            };

            // Lock released: the descent may suspend on store lookups
            let result = Descent::new(
                &self.store,
                LatestMessageSource::Store {
                    overlay: Some(&overlay),
                },
            )
            .execute(&key_block)
            .await?;

            let mut inner = cell.inner.lock();
            if inner.version == version {
                inner.memo = Some(result.clone());
            }

            Ok(result)
        }
    }

    fn from_justifications(
        &self,
        key_block: &MessageHash,
        justifications: &[MessageHash],
    ) -> impl Future<Output = Result<ForkChoiceResult, ForkChoiceError>> + Send {
        // Justification-seeded queries do not read the latest-message view, so the overlay does
        // not apply and there is nothing to memoize
        let key_block = *key_block;
        async move {
            let seed =
                descent::resolve_justifications(&self.store, &key_block, justifications).await?;
            Descent::new(&self.store, LatestMessageSource::Justifications(&seed))
                .execute(&key_block)
                .await
        }
    }
}

impl<S> ForkChoiceManager for CachingForkChoiceManager<S>
where
    S: MessageStore,
{
    fn update_latest_message(
        &self,
        key_block: &MessageHash,
        message: Message,
    ) -> impl Future<Output = Result<(), ForkChoiceError>> + Send {
        let key_block = *key_block;
        async move {
            let cell = self.cell(&key_block);
            let mut inner = cell.inner.lock();

            debug!(
                %key_block,
                message = %message.hash,
                era = %message.era_id,
                "Applying latest message update"
            );
            insert_latest(inner.overlay.entry(message.era_id).or_default(), message);
            inner.version += 1;
            inner.memo = None;

            Ok(())
        }
    }
}
