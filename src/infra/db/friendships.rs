use async_trait::async_trait;
use sqlx::{PgPool, query, query_scalar};

use crate::application::repos::{FollowGraph, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Relational backend: one `friendships` row per edge.
#[async_trait]
impl FollowGraph for PostgresRepositories {
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        query_scalar::<_, i64>(
            "SELECT from_user_id FROM friendships WHERE to_user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        query_scalar::<_, i64>(
            "SELECT to_user_id FROM friendships WHERE from_user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follower_count(&self, user_id: i64) -> Result<u64, RepoError> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM friendships WHERE to_user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map(count)
            .map_err(map_sqlx_error)
    }

    async fn following_count(&self, user_id: i64) -> Result<u64, RepoError> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM friendships WHERE from_user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map(count)
            .map_err(map_sqlx_error)
    }

    async fn has_followed(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM friendships WHERE from_user_id = $1 AND to_user_id = $2)",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        let result = query(
            "INSERT INTO friendships (from_user_id, to_user_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT friendships_from_to_key DO NOTHING",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        let result = query("DELETE FROM friendships WHERE from_user_id = $1 AND to_user_id = $2")
            .bind(from_user_id)
            .bind(to_user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Edge-store backend: the graph is kept twice, once per direction, so each
/// lookup reads a single user's partition.
#[derive(Clone)]
pub struct PostgresEdgeStore {
    repositories: PostgresRepositories,
}

impl PostgresEdgeStore {
    pub fn new(repositories: PostgresRepositories) -> Self {
        Self { repositories }
    }

    fn pool(&self) -> &PgPool {
        self.repositories.pool()
    }
}

#[async_trait]
impl FollowGraph for PostgresEdgeStore {
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        query_scalar::<_, i64>(
            "SELECT follower_id FROM follower_edges WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        query_scalar::<_, i64>(
            "SELECT following_id FROM following_edges WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follower_count(&self, user_id: i64) -> Result<u64, RepoError> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM follower_edges WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map(count)
            .map_err(map_sqlx_error)
    }

    async fn following_count(&self, user_id: i64) -> Result<u64, RepoError> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM following_edges WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map(count)
            .map_err(map_sqlx_error)
    }

    async fn has_followed(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM following_edges WHERE user_id = $1 AND following_id = $2)",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn follow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        let mut tx = self.repositories.begin().await.map_err(map_sqlx_error)?;

        let inserted = query(
            "INSERT INTO following_edges (user_id, following_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        query(
            "INSERT INTO follower_edges (user_id, follower_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(to_user_id)
        .bind(from_user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(inserted > 0)
    }

    async fn unfollow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError> {
        let mut tx = self.repositories.begin().await.map_err(map_sqlx_error)?;

        let removed = query("DELETE FROM following_edges WHERE user_id = $1 AND following_id = $2")
            .bind(from_user_id)
            .bind(to_user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        query("DELETE FROM follower_edges WHERE user_id = $1 AND follower_id = $2")
            .bind(to_user_id)
            .bind(from_user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed > 0)
    }
}
