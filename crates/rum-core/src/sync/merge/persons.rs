//! Profiles and relations: the newest synced record supersedes the rest

use crate::classify::{ProfilePayload, RelationPayload};
use crate::db::{ProfileRepository, RelationRepository};
use crate::error::Result;
use crate::models::{ContentStatus, Profile, Relation, TrxId};
use crate::sync::engine::{Effects, MergePage};

use super::{reconcile, Envelope, Reconcile};

pub fn merge_profiles(
    page: &MergePage<'_>,
    items: Vec<(Envelope, ProfilePayload)>,
    effects: &mut Effects,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let repo = ProfileRepository::new(page.conn);
    let ids: Vec<TrxId> = items.iter().map(|(envelope, _)| envelope.trx_id.clone()).collect();
    let existing = repo.get_many(&ids)?;

    for (envelope, payload) in items {
        let stored = existing.get(&envelope.trx_id);
        let now_synced = match reconcile(
            stored.map(|profile| (profile.status, profile.publisher.as_str())),
            &envelope.publisher,
        ) {
            Reconcile::Insert => {
                repo.insert(&Profile {
                    trx_id: envelope.trx_id.clone(),
                    group_id: page.group_id().to_string(),
                    publisher: envelope.publisher.clone(),
                    timestamp: envelope.timestamp,
                    name: payload.name,
                    avatar: payload.avatar,
                    wallet: payload.wallet,
                    status: ContentStatus::Synced,
                })?;
                true
            }
            Reconcile::Confirm => repo.set_status(&envelope.trx_id, ContentStatus::Synced)?,
            Reconcile::Skip => false,
        };

        if now_synced {
            let replaced =
                repo.replace_previous(page.group_id(), &envelope.publisher, &envelope.trx_id)?;
            tracing::trace!(
                publisher = %envelope.publisher,
                replaced,
                "Profile updated"
            );
            let key = (page.group_id().to_string(), envelope.publisher);
            if !effects.profiles.contains(&key) {
                effects.profiles.push(key);
            }
        }
    }
    Ok(())
}

pub fn merge_relations(
    page: &MergePage<'_>,
    items: Vec<(Envelope, RelationPayload)>,
    effects: &mut Effects,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let repo = RelationRepository::new(page.conn);
    let ids: Vec<TrxId> = items.iter().map(|(envelope, _)| envelope.trx_id.clone()).collect();
    let existing = repo.get_many(&ids)?;

    for (envelope, payload) in items {
        let relation = Relation {
            trx_id: envelope.trx_id.clone(),
            group_id: page.group_id().to_string(),
            publisher: envelope.publisher.clone(),
            target: payload.target,
            kind: payload.kind,
            timestamp: envelope.timestamp,
            status: ContentStatus::Synced,
        };

        let stored = existing.get(&envelope.trx_id);
        let now_synced = match reconcile(
            stored.map(|relation| (relation.status, relation.publisher.as_str())),
            &envelope.publisher,
        ) {
            Reconcile::Insert => {
                repo.insert(&relation)?;
                true
            }
            Reconcile::Confirm => repo.set_status(&envelope.trx_id, ContentStatus::Synced)?,
            Reconcile::Skip => false,
        };

        if now_synced {
            repo.replace_previous(&relation)?;
            let key = (page.group_id().to_string(), envelope.publisher);
            if !effects.profiles.contains(&key) {
                effects.profiles.push(key);
            }
        }
    }
    Ok(())
}
