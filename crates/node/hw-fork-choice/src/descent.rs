//! The weight-maximizing descent shared by both fork-choice entry points.
//!
//! One "segment" covers the stretch of blocks decided by a single era's validators: from the
//! segment anchor down to the last block any of that era's latest messages supports. Segments
//! are chained era-by-era: the first segment runs in the era containing the key block (the
//! anchor era's parent, or the genesis era itself), each further segment in the child era whose
//! key block lies on the path descended so far.

use crate::{ForkChoiceError, ForkChoiceResult};
use hw_client_api::{EraInfo, Message, MessageKind, MessageStore};
use hw_core_primitives::hashes::MessageHash;
use hw_core_primitives::validator::ValidatorIndex;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Latest message per validator, grouped by the era (key block hash) the messages belong to
pub(crate) type LatestByEra = BTreeMap<MessageHash, BTreeMap<ValidatorIndex, Message>>;

/// Where the latest messages for each traversed era segment come from
#[derive(Debug)]
pub(crate) enum LatestMessageSource<'a> {
    /// The store's latest-per-validator view, optionally merged with announced updates that the
    /// store may not reflect yet
    Store {
        overlay: Option<&'a LatestByEra>,
    },
    /// Only the supplied justification set; the store's latest-message view is not consulted
    Justifications(&'a LatestByEra),
}

/// Result of descending a single era segment
struct Segment {
    /// The last block the segment's votes support
    tip: MessageHash,
    /// Every block visited from the anchor to the tip, anchor and tip included
    path: BTreeSet<MessageHash>,
}

pub(crate) struct Descent<'a, S> {
    store: &'a S,
    source: LatestMessageSource<'a>,
}

impl<'a, S> Descent<'a, S>
where
    S: MessageStore,
{
    pub(crate) fn new(store: &'a S, source: LatestMessageSource<'a>) -> Self {
        Self { store, source }
    }

    /// Run the full descent for the era identified by `key_block`
    pub(crate) async fn execute(
        &self,
        key_block: &MessageHash,
    ) -> Result<ForkChoiceResult, ForkChoiceError> {
        let anchor_era = self
            .store
            .era(key_block)
            .await?
            .ok_or(ForkChoiceError::UnknownKeyBlock {
                key_block: *key_block,
            })?;

        // The key block itself lives in the parent era (at its key boundary); that is where the
        // descent starts. The genesis era is anchored at its own key block, the genesis block.
        let mut era = match &anchor_era.parent_key_block {
            Some(parent_key_block) => self.store.era(parent_key_block).await?.ok_or(
                ForkChoiceError::UnknownKeyBlock {
                    key_block: *parent_key_block,
                },
            )?,
            None => anchor_era.clone(),
        };
        let mut tip = anchor_era.key_block;
        let mut justifications = BTreeMap::<MessageHash, Message>::new();

        loop {
            let latest = self.era_latest(&era).await?;
            let segment = self.descend_segment(&era, tip, &latest).await?;
            trace!(
                era = %era.key_block,
                anchor = %tip,
                tip = %segment.tip,
                "Descended era segment"
            );

            justifications.extend(latest.into_values().map(|message| (message.hash, message)));
            tip = segment.tip;

            // The descent continues in the child era whose key block lies on the path just
            // descended. Paths are chains and each era has a single key boundary, so at most one
            // child can match; taking the minimum key block hash keeps even a malformed store
            // deterministic.
            let next_era = self
                .store
                .child_eras(&era.key_block)
                .await?
                .into_iter()
                .filter(|child_era| segment.path.contains(&child_era.key_block))
                .min_by_key(|child_era| child_era.key_block);

            match next_era {
                Some(next_era) => era = next_era,
                None => break,
            }
        }

        Ok(ForkChoiceResult {
            block: tip,
            justifications: justifications.into_values().collect(),
        })
    }

    /// Latest message per validator for one era segment, restricted to validators carrying
    /// weight in that era
    async fn era_latest(
        &self,
        era: &EraInfo,
    ) -> Result<BTreeMap<ValidatorIndex, Message>, ForkChoiceError> {
        let mut latest = BTreeMap::new();

        match &self.source {
            LatestMessageSource::Store { overlay } => {
                for message in self.store.latest_messages(&era.key_block).await? {
                    insert_latest(&mut latest, message);
                }
                if let Some(era_overlay) =
                    overlay.and_then(|overlay| overlay.get(&era.key_block))
                {
                    for message in era_overlay.values() {
                        insert_latest(&mut latest, message.clone());
                    }
                }
            }
            LatestMessageSource::Justifications(by_era) => {
                if let Some(era_latest) = by_era.get(&era.key_block) {
                    latest = era_latest.clone();
                }
            }
        }

        latest.retain(|validator, _message| {
            era.validators
                .get(validator)
                .is_some_and(|weight| !weight.is_zero())
        });

        Ok(latest)
    }

    /// Descend one era segment from `anchor` following the era's votes.
    ///
    /// Every latest message's vote chain is walked parent-by-parent toward the anchor; blocks on
    /// chains that reach the anchor accrue the voting validator's weight. The descent then
    /// greedily follows the heaviest child at every fork, ties broken by the lowest hash.
    async fn descend_segment(
        &self,
        era: &EraInfo,
        anchor: MessageHash,
        latest: &BTreeMap<ValidatorIndex, Message>,
    ) -> Result<Segment, ForkChoiceError> {
        // Cumulative stake per block, summed in u128 so whole weight tables can't overflow
        let mut scores = BTreeMap::<MessageHash, u128>::new();
        let mut children = BTreeMap::<MessageHash, BTreeSet<MessageHash>>::new();

        for (validator, message) in latest {
            let Some(weight) = era.validators.get(validator) else {
                continue;
            };

            // Walk from the voted block toward the anchor, recording parent links
            let mut chain = Vec::new();
            let mut cursor = message.vote();
            let reached_anchor = loop {
                if cursor == anchor {
                    break true;
                }
                let block = self.store.message(&cursor).await?.ok_or(
                    ForkChoiceError::UnknownMessage { hash: cursor },
                )?;
                let MessageKind::Block { parent } = block.kind else {
                    return Err(ForkChoiceError::InvalidVoteTarget { hash: cursor });
                };
                match parent {
                    Some(parent) => {
                        chain.push((cursor, parent));
                        cursor = parent;
                    }
                    // Reached the genesis block without meeting the anchor: the vote supports
                    // another branch and contributes nothing here
                    None => break false,
                }
            };
            if !reached_anchor {
                continue;
            }

            for (block, parent) in chain {
                *scores.entry(block).or_default() += weight.as_u128();
                children.entry(parent).or_default().insert(block);
            }
        }

        let mut tip = anchor;
        let mut path = BTreeSet::from([anchor]);
        while let Some(fork_children) = children.get(&tip) {
            let next = fork_children
                .iter()
                .max_by(|a, b| {
                    let score_a = scores.get(*a).copied().unwrap_or_default();
                    let score_b = scores.get(*b).copied().unwrap_or_default();
                    // Greatest cumulative stake wins, equal stakes resolve to the lowest hash
                    score_a.cmp(&score_b).then_with(|| b.cmp(a))
                })
                .copied()
                .expect("Child sets are only ever created non-empty; qed");
            tip = next;
            path.insert(next);
        }

        Ok(Segment { tip, path })
    }
}

/// Insert `message` as its validator's latest message unless a later one is already present.
///
/// A higher round tick wins; equal round ticks (an equivocating validator) resolve to the lowest
/// hash so every node keeps the same message.
pub(crate) fn insert_latest(latest: &mut BTreeMap<ValidatorIndex, Message>, message: Message) {
    match latest.entry(message.validator) {
        Entry::Vacant(entry) => {
            entry.insert(message);
        }
        Entry::Occupied(mut entry) => {
            let current = entry.get();
            let newer = message.round_tick > current.round_tick
                || (message.round_tick == current.round_tick && message.hash < current.hash);
            if newer {
                entry.insert(message);
            }
        }
    }
}

/// Resolve an explicit justification set into latest messages per era and validator, validating
/// that every justification belongs to an era lineage-related to the anchor
pub(crate) async fn resolve_justifications<S>(
    store: &S,
    anchor_key_block: &MessageHash,
    justifications: &[MessageHash],
) -> Result<LatestByEra, ForkChoiceError>
where
    S: MessageStore,
{
    let mut by_era = LatestByEra::new();

    for hash in justifications {
        let message = store
            .message(hash)
            .await?
            .ok_or(ForkChoiceError::UnknownMessage { hash: *hash })?;

        if !era_lineage_related(store, anchor_key_block, &message.era_id).await? {
            return Err(ForkChoiceError::ForeignJustification {
                hash: *hash,
                era: message.era_id,
            });
        }

        insert_latest(by_era.entry(message.era_id).or_default(), message);
    }

    Ok(by_era)
}

/// Whether `other` identifies the anchor era itself, one of its ancestors or one of its
/// descendants, following `parent_key_block` links
async fn era_lineage_related<S>(
    store: &S,
    anchor_key_block: &MessageHash,
    other: &MessageHash,
) -> Result<bool, ForkChoiceError>
where
    S: MessageStore,
{
    if anchor_key_block == other {
        return Ok(true);
    }

    for (from, target) in [(other, anchor_key_block), (anchor_key_block, other)] {
        let mut cursor = *from;
        loop {
            let Some(era) = store.era(&cursor).await? else {
                break;
            };
            match era.parent_key_block {
                Some(parent_key_block) if parent_key_block == *target => return Ok(true),
                Some(parent_key_block) => cursor = parent_key_block,
                None => break,
            }
        }
    }

    Ok(false)
}
