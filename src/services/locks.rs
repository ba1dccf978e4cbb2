//! Redis-backed mutex locks for table- and row-level mutual exclusion.
//!
//! Lock keys follow `lock:{table}` or `lock:{table}:{pk}`. A lock expires
//! on its own after `MUTEX_LOCK_TIMEOUT` seconds; acquisition blocks up to
//! `MUTEX_LOCK_MAX_WAIT_TIME` seconds before giving up. Only the owner
//! (matched by a random token) releases a lock.

use redis::aio::ConnectionManager;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constants::{MUTEX_LOCK_MAX_WAIT_TIME, MUTEX_LOCK_TIMEOUT};
use crate::errors::{ApiError, ApiResult};

const RETRY_DELAY_MS: u64 = 100;

#[derive(Clone)]
pub struct LockManager {
    redis: ConnectionManager,
}

/// A held lock. Release explicitly after the guarded work commits; an
/// unreleased lock still expires server-side.
pub struct MutexLock {
    key: String,
    owner: String,
}

impl LockManager {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Acquire a table-level lock.
    pub async fn acquire(&self, table: &str) -> ApiResult<MutexLock> {
        self.acquire_key(format!("lock:{}", table)).await
    }

    /// Acquire a row-level lock.
    pub async fn acquire_row(&self, table: &str, pk: i32) -> ApiResult<MutexLock> {
        self.acquire_key(format!("lock:{}:{}", table, pk)).await
    }

    async fn acquire_key(&self, key: String) -> ApiResult<MutexLock> {
        let owner = Uuid::new_v4().to_string();
        let deadline = Instant::now() + Duration::from_secs(MUTEX_LOCK_MAX_WAIT_TIME);
        let mut conn = self.redis.clone();

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&owner)
                .arg("NX")
                .arg("PX")
                .arg(MUTEX_LOCK_TIMEOUT * 1000)
                .query_async(&mut conn)
                .await?;
            if acquired.is_some() {
                return Ok(MutexLock { key, owner });
            }
            if Instant::now() >= deadline {
                return Err(ApiError::LockAcquireTimeout);
            }
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
        }
    }

    /// Release a lock if we still own it. Errors are logged, not surfaced;
    /// the lock expires on its own either way.
    pub async fn release(&self, lock: MutexLock) {
        let mut conn = self.redis.clone();
        let current: Result<Option<String>, _> = redis::cmd("GET")
            .arg(&lock.key)
            .query_async(&mut conn)
            .await;
        match current {
            Ok(Some(owner)) if owner == lock.owner => {
                if let Err(err) = redis::cmd("DEL")
                    .arg(&lock.key)
                    .query_async::<i64>(&mut conn)
                    .await
                {
                    tracing::warn!("failed to release lock {}: {}", lock.key, err);
                }
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("failed to inspect lock {}: {}", lock.key, err),
        }
    }

    /// Readiness probe: round-trip a PING.
    pub async fn ping(&self) -> ApiResult<()> {
        let mut conn = self.redis.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(ApiError::Internal(format!("unexpected PING reply: {}", pong)))
        }
    }
}
