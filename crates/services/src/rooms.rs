use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::dao::{RoundDirectory, RoundOwnership};
use crate::fanout::RoomBus;

/// Access predicate for joining a round's room: administrative roles are
/// unconditional, everyone else must be the assigned interviewer or the
/// round's candidate.
pub fn authorized(identity: &Identity, ownership: &RoundOwnership) -> bool {
    identity.role.is_administrative()
        || ownership.interviewer_id == Some(identity.id)
        || ownership.candidate_id == identity.id
}

/// Process-local room membership. True membership is the union of every
/// instance's registry, stitched together by the cluster bus; this map only
/// answers "which local connections get a delivery for round X".
///
/// All mutations are synchronous (no await points), so a join or leave is
/// atomic within one turn of the event loop.
pub struct RoomRegistry {
    member_room: DashMap<String, Uuid>,
    rooms: DashMap<Uuid, HashSet<String>>,
}

pub(crate) struct JoinTransition {
    pub previous: Option<Uuid>,
    pub previous_emptied: bool,
    pub first_local_member: bool,
}

pub(crate) struct LeaveTransition {
    pub round_id: Uuid,
    pub emptied: bool,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            member_room: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    pub(crate) fn join(&self, connection_id: &str, round_id: Uuid) -> JoinTransition {
        let previous = self.member_room.insert(connection_id.to_string(), round_id);

        let mut previous_emptied = false;
        if let Some(prev) = previous
            && prev != round_id
        {
            if let Some(mut members) = self.rooms.get_mut(&prev) {
                members.remove(connection_id);
            }
            previous_emptied = self
                .rooms
                .remove_if(&prev, |_, members| members.is_empty())
                .is_some();
        }

        let mut members = self.rooms.entry(round_id).or_default();
        let first_local_member = members.is_empty();
        members.insert(connection_id.to_string());

        JoinTransition {
            previous,
            previous_emptied,
            first_local_member,
        }
    }

    pub(crate) fn leave(&self, connection_id: &str) -> Option<LeaveTransition> {
        let (_, round_id) = self.member_room.remove(connection_id)?;

        if let Some(mut members) = self.rooms.get_mut(&round_id) {
            members.remove(connection_id);
        }
        let emptied = self
            .rooms
            .remove_if(&round_id, |_, members| members.is_empty())
            .is_some();

        Some(LeaveTransition { round_id, emptied })
    }

    pub fn members(&self, round_id: Uuid) -> Vec<String> {
        self.rooms
            .get(&round_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: &str) -> Option<Uuid> {
        self.member_room.get(connection_id).map(|r| *r.value())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JoinGrant {
    /// The connection was already in this room; the caller still re-acks
    /// and re-delivers catch-up, but membership did not change.
    pub rejoined: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("not authorized for this round")]
    AccessDenied,
}

/// Join/leave orchestration: access control, the one-room-per-connection
/// invariant, and cluster topic interest tracking.
pub struct RoomService {
    registry: RoomRegistry,
    directory: Arc<dyn RoundDirectory>,
    bus: Arc<dyn RoomBus>,
}

impl RoomService {
    pub fn new(directory: Arc<dyn RoundDirectory>, bus: Arc<dyn RoomBus>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            directory,
            bus,
        }
    }

    pub async fn join(
        &self,
        connection_id: &str,
        identity: &Identity,
        round_id: Uuid,
    ) -> Result<JoinGrant, RoomError> {
        let ownership = match self.directory.ownership(round_id).await {
            Ok(Some(ownership)) => ownership,
            Ok(None) => {
                debug!(%round_id, user_id = %identity.id, "join denied, unknown round");
                return Err(RoomError::AccessDenied);
            }
            Err(e) => {
                // A failed lookup must deny, never allow.
                warn!(%round_id, %e, "ownership lookup failed, denying join");
                return Err(RoomError::AccessDenied);
            }
        };

        if !authorized(identity, &ownership) {
            debug!(%round_id, user_id = %identity.id, role = ?identity.role, "join denied");
            return Err(RoomError::AccessDenied);
        }

        let transition = self.registry.join(connection_id, round_id);

        if transition.previous_emptied
            && let Some(prev) = transition.previous
        {
            self.bus.unsubscribe(prev).await;
        }
        if transition.first_local_member {
            self.bus.subscribe(round_id).await;
        }

        info!(%round_id, %connection_id, user_id = %identity.id, "joined room");
        Ok(JoinGrant {
            rejoined: transition.previous == Some(round_id),
        })
    }

    /// Idempotent; a connection not in any room is a no-op. Disconnects
    /// funnel through here as well.
    pub async fn leave(&self, connection_id: &str) {
        if let Some(transition) = self.registry.leave(connection_id) {
            if transition.emptied {
                self.bus.unsubscribe(transition.round_id).await;
            }
            info!(round_id = %transition.round_id, %connection_id, "left room");
        }
    }

    pub async fn broadcast(&self, round_id: Uuid, event: serde_json::Value) {
        self.bus.publish(round_id, event).await;
    }

    pub fn local_members(&self, round_id: Uuid) -> Vec<String> {
        self.registry.members(round_id)
    }

    pub fn room_of(&self, connection_id: &str) -> Option<Uuid> {
        self.registry.room_of(connection_id)
    }
}
