//! Follow graph access routed between two storage backends.
//!
//! The `switch_friendship_to_edge_store` gate decides, per call, whether the
//! relational `friendships` table or the denormalized edge tables answer.
//! The set of ids a user follows is cached in the shared store and dropped,
//! never patched, whenever that user follows or unfollows someone.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::gatekeeper::GateKeeper;
use crate::application::repos::{FollowGraph, RepoError};
use crate::cache::{CacheError, KeyValueStore, followings_key};
use crate::domain::types::GraphBackend;

pub const EDGE_STORE_GATE: &str = "switch_friendship_to_edge_store";

#[derive(Debug, Error)]
pub enum FriendshipError {
    #[error("gate lookup failed: {0}")]
    Gate(#[from] CacheError),
    #[error("following cache could not be invalidated: {0}")]
    Invalidate(CacheError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Resolves who should receive an owner's new items.
#[async_trait]
pub trait FollowerResolver: Send + Sync {
    async fn follower_ids(&self, owner_id: i64) -> Result<Vec<i64>, FriendshipError>;
}

#[derive(Clone)]
pub struct FriendshipService {
    gate: GateKeeper,
    store: Arc<dyn KeyValueStore>,
    relational: Arc<dyn FollowGraph>,
    edge_store: Arc<dyn FollowGraph>,
}

impl FriendshipService {
    pub fn new(
        gate: GateKeeper,
        store: Arc<dyn KeyValueStore>,
        relational: Arc<dyn FollowGraph>,
        edge_store: Arc<dyn FollowGraph>,
    ) -> Self {
        Self {
            gate,
            store,
            relational,
            edge_store,
        }
    }

    pub async fn backend(&self) -> Result<GraphBackend, FriendshipError> {
        let backend = if self.gate.is_switch_on(EDGE_STORE_GATE).await? {
            GraphBackend::EdgeStore
        } else {
            GraphBackend::Relational
        };
        debug!(
            target = "application::friendships::backend",
            backend = backend.as_str(),
            "Resolved follow graph backend"
        );
        Ok(backend)
    }

    async fn graph(&self) -> Result<&dyn FollowGraph, FriendshipError> {
        Ok(match self.backend().await? {
            GraphBackend::Relational => self.relational.as_ref(),
            GraphBackend::EdgeStore => self.edge_store.as_ref(),
        })
    }

    pub async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, FriendshipError> {
        Ok(self.graph().await?.follower_ids(user_id).await?)
    }

    pub async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, FriendshipError> {
        Ok(self.graph().await?.following_ids(user_id).await?)
    }

    pub async fn follower_count(&self, user_id: i64) -> Result<u64, FriendshipError> {
        Ok(self.graph().await?.follower_count(user_id).await?)
    }

    pub async fn following_count(&self, user_id: i64) -> Result<u64, FriendshipError> {
        Ok(self.graph().await?.following_count(user_id).await?)
    }

    /// A user always counts as following themselves.
    pub async fn has_followed(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<bool, FriendshipError> {
        if from_user_id == to_user_id {
            return Ok(true);
        }
        Ok(self
            .graph()
            .await?
            .has_followed(from_user_id, to_user_id)
            .await?)
    }

    /// Ids `user_id` follows, served from the shared store when cached.
    ///
    /// An unreachable or unreadable cache entry falls through to the graph;
    /// an unreadable one is overwritten.
    pub async fn following_id_set(&self, user_id: i64) -> Result<BTreeSet<i64>, FriendshipError> {
        let key = followings_key(user_id);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<BTreeSet<i64>>(&raw) {
                Ok(ids) => return Ok(ids),
                Err(err) => warn!(
                    target = "application::friendships::following_id_set",
                    key = %key,
                    error = %err,
                    "Discarding unreadable following set"
                ),
            },
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = "application::friendships::following_id_set",
                    key = %key,
                    error = %err,
                    "Following cache unavailable, reading the graph"
                );
                return Ok(self.following_ids(user_id).await?.into_iter().collect());
            }
        }

        let ids: BTreeSet<i64> = self.following_ids(user_id).await?.into_iter().collect();
        match serde_json::to_string(&ids) {
            Ok(raw) => {
                if let Err(err) = self.store.set(&key, &raw).await {
                    warn!(
                        target = "application::friendships::following_id_set",
                        key = %key,
                        error = %err,
                        "Could not cache following set"
                    );
                }
            }
            Err(err) => warn!(
                target = "application::friendships::following_id_set",
                key = %key,
                error = %err,
                "Could not encode following set"
            ),
        }
        Ok(ids)
    }

    /// Drop the cached following set of `user_id`.
    ///
    /// Deleting rather than rewriting keeps two concurrent follows from
    /// overwriting each other's additions.
    pub async fn invalidate_following_cache(&self, user_id: i64) -> Result<(), FriendshipError> {
        self.store
            .delete(&followings_key(user_id))
            .await
            .map_err(FriendshipError::Invalidate)
    }

    /// Following yourself is a no-op and reports `false`.
    pub async fn follow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, FriendshipError> {
        if from_user_id == to_user_id {
            return Ok(false);
        }
        let created = self.graph().await?.follow(from_user_id, to_user_id).await?;
        self.invalidate_following_cache(from_user_id).await?;
        Ok(created)
    }

    pub async fn unfollow(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<bool, FriendshipError> {
        if from_user_id == to_user_id {
            return Ok(false);
        }
        let removed = self
            .graph()
            .await?
            .unfollow(from_user_id, to_user_id)
            .await?;
        self.invalidate_following_cache(from_user_id).await?;
        Ok(removed)
    }
}

#[async_trait]
impl FollowerResolver for FriendshipService {
    async fn follower_ids(&self, owner_id: i64) -> Result<Vec<i64>, FriendshipError> {
        FriendshipService::follower_ids(self, owner_id).await
    }
}
