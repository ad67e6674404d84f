//! Redis-backed read store.
//!
//! Each projection lives in a hash `appointment:{id}` with two fields:
//! `version` (integer) and `document` (JSON projection). The version guard
//! runs inside a Lua script so concurrent workers cannot interleave the
//! compare and the write.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::debug;
use uuid::Uuid;

use crate::error::ProjectionError;
use crate::projection::AppointmentProjection;
use crate::store::{ReadModelStore, UpsertOutcome};

const UPSERT_IF_NEWER: &str = r"
local current = redis.call('HGET', KEYS[1], 'version')
if current and tonumber(current) >= tonumber(ARGV[1]) then
    return 0
end
redis.call('HSET', KEYS[1], 'version', ARGV[1], 'document', ARGV[2])
return 1
";

/// Read store backed by Redis hashes.
///
/// Clones share one `ConnectionManager`, which reconnects on failure.
#[derive(Clone)]
pub struct RedisReadModelStore {
    conn_manager: ConnectionManager,
    upsert: Script,
}

impl std::fmt::Debug for RedisReadModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisReadModelStore").finish_non_exhaustive()
    }
}

impl RedisReadModelStore {
    /// Connects to Redis at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::ReadStore` if the URL is invalid or the
    /// initial connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, ProjectionError> {
        let client = Client::open(redis_url).map_err(|e| {
            ProjectionError::ReadStore(format!("failed to create Redis client: {e}"))
        })?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            ProjectionError::ReadStore(format!("failed to connect to Redis: {e}"))
        })?;
        Ok(Self {
            conn_manager,
            upsert: Script::new(UPSERT_IF_NEWER),
        })
    }

    /// Redis key holding the projection for `appointment_id`.
    #[must_use]
    pub fn key(appointment_id: Uuid) -> String {
        format!("appointment:{appointment_id}")
    }
}

#[async_trait]
impl ReadModelStore for RedisReadModelStore {
    async fn upsert_if_newer(
        &self,
        projection: &AppointmentProjection,
    ) -> Result<UpsertOutcome, ProjectionError> {
        let document = serde_json::to_string(projection).map_err(|e| {
            ProjectionError::ReadStore(format!("failed to encode projection: {e}"))
        })?;
        let mut conn = self.conn_manager.clone();
        let key = Self::key(projection.appointment_id);

        let applied: i64 = self
            .upsert
            .key(&key)
            .arg(projection.version)
            .arg(document)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ProjectionError::ReadStore(format!("upsert failed for {key}: {e}")))?;

        debug!(
            appointment_id = %projection.appointment_id,
            version = projection.version,
            applied = applied == 1,
            "read model upsert"
        );
        Ok(if applied == 1 {
            UpsertOutcome::Applied
        } else {
            UpsertOutcome::Stale
        })
    }

    async fn get(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentProjection>, ProjectionError> {
        let mut conn = self.conn_manager.clone();
        let key = Self::key(appointment_id);

        let document: Option<String> = conn
            .hget(&key, "document")
            .await
            .map_err(|e| ProjectionError::ReadStore(format!("failed to read {key}: {e}")))?;

        document
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    ProjectionError::ReadStore(format!("corrupt projection at {key}: {e}"))
                })
            })
            .transpose()
    }
}
