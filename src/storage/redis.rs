//! Redis-backed [`Storage`], using a single `EVAL`'d Lua script so the
//! read-refill-admit-write sequence executes as one atomic
//! round trip against the shared store.
//!
//! A client-side `GET` followed by a `SET` is two round trips and is not
//! atomic under concurrent callers; this module never does that.

use std::time::Duration;

use deadpool_redis::redis::{AsyncCommands, Script};
use deadpool_redis::{Config, Connection, Pool, Runtime};

use crate::algorithm::EvalOutcome;
use crate::error::StorageError;
use crate::policy::{Algorithm, Policy};
use crate::storage::Storage;

/// Mirrors [`crate::algorithm::token_bucket::evaluate`] and
/// [`crate::algorithm::leaky_bucket::evaluate`] step for step; any change to
/// either function's arithmetic must be made here too.
const EVALUATE_SCRIPT: &str = r#"
local now_ticks      = tonumber(ARGV[1])
local permit_limit   = tonumber(ARGV[2])
local window_ticks   = tonumber(ARGV[3])
local burst_capacity = tonumber(ARGV[4])
local precision_ticks= tonumber(ARGV[5])
local requested      = tonumber(ARGV[6])
local ttl_seconds    = tonumber(ARGV[7])
local cooldown_ticks = tonumber(ARGV[8])
local is_token_bucket = ARGV[9] == "token_bucket"

local rate_per_tick = permit_limit / window_ticks

local stored = redis.call("HMGET", KEYS[1], "primary", "last_update")
local primary = tonumber(stored[1])
local last_update = tonumber(stored[2])

if primary == nil or last_update == nil or last_update == 0 then
    if is_token_bucket then
        primary = burst_capacity
    else
        primary = 0
    end
    last_update = now_ticks
end

local elapsed = now_ticks - last_update
if elapsed < 0 then elapsed = 0 end

if is_token_bucket then
    primary = math.min(primary + elapsed * rate_per_tick, burst_capacity)
else
    primary = math.max(primary - elapsed * rate_per_tick, 0)
end

requested = math.min(requested, burst_capacity)

local allowed
if is_token_bucket then
    allowed = primary >= requested
else
    allowed = (primary + requested) <= burst_capacity
end

local used = 0
local retry_after_ticks = 0

if allowed then
    used = requested
    if is_token_bucket then
        primary = primary - requested
    else
        primary = primary + requested
    end
else
    local shortfall
    if is_token_bucket then
        shortfall = requested - primary
    else
        shortfall = primary + requested - burst_capacity
    end
    local ticks_until = math.ceil(shortfall / rate_per_tick)
    if ticks_until < precision_ticks then ticks_until = precision_ticks end
    retry_after_ticks = math.min(ticks_until, window_ticks)
    if cooldown_ticks >= 0 and retry_after_ticks < cooldown_ticks then
        retry_after_ticks = cooldown_ticks
    end
end

redis.call("HMSET", KEYS[1], "primary", tostring(primary), "last_update", tostring(now_ticks))
redis.call("EXPIRE", KEYS[1], ttl_seconds)

local remaining
local ticks_to_bound
if is_token_bucket then
    remaining = primary
    ticks_to_bound = math.ceil((burst_capacity - primary) / rate_per_tick)
else
    remaining = burst_capacity - primary
    ticks_to_bound = math.ceil(primary / rate_per_tick)
end
if remaining < 0 then remaining = 0 end

local reset_lo = precision_ticks
local reset_hi = window_ticks
if reset_hi < reset_lo then reset_hi = reset_lo end
local reset_after_ticks = ticks_to_bound
if reset_after_ticks < reset_lo then reset_after_ticks = reset_lo end
if reset_after_ticks > reset_hi then reset_after_ticks = reset_hi end

local allowed_flag = 0
if allowed then allowed_flag = 1 end

return {allowed_flag, tostring(remaining), tostring(used), retry_after_ticks, reset_after_ticks}
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub key_prefix: String,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "ratequota:".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Redis-backed [`Storage`] using connection pooling and a single atomic
/// evaluation script.
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
    script: Script,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStorage {
    pub async fn new(config: RedisConfig) -> Result<Self, StorageError> {
        let mut cfg = Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);
        cfg.pool = Some(pool_config);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        let _: () = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
            script: Script::new(EVALUATE_SCRIPT),
        })
    }

    pub async fn from_url(url: impl Into<String>) -> Result<Self, StorageError> {
        Self::new(RedisConfig::new(url)).await
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_conn(&self) -> Result<Connection, StorageError> {
        self.pool.get().await.map_err(|_| StorageError::PoolExhausted)
    }
}

impl Storage for RedisStorage {
    async fn evaluate(
        &self,
        key: &str,
        policy: &Policy,
        now_ticks: i64,
        requested_tokens: f64,
        ttl: Duration,
    ) -> Result<EvalOutcome, StorageError> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);
        let ttl_seconds = ttl.as_secs().max(1);
        let cooldown_ticks = policy.cooldown_ticks().unwrap_or(-1);
        let algorithm_name = match policy.algorithm() {
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::LeakyBucket => "leaky_bucket",
        };

        let (allowed_flag, remaining, used, retry_after_ticks, reset_after_ticks): (
            i64,
            String,
            String,
            i64,
            i64,
        ) = self
            .script
            .key(&full_key)
            .arg(now_ticks)
            .arg(policy.permit_limit())
            .arg(policy.window_ticks())
            .arg(policy.burst_capacity())
            .arg(policy.precision_ticks())
            .arg(requested_tokens)
            .arg(ttl_seconds)
            .arg(cooldown_ticks)
            .arg(algorithm_name)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| StorageError::ScriptFailed(e.to_string()))?;

        let remaining: f64 = remaining
            .parse()
            .map_err(|_| StorageError::Serialization("non-numeric remaining from script".into()))?;
        let used: f64 = used
            .parse()
            .map_err(|_| StorageError::Serialization("non-numeric used from script".into()))?;

        Ok(EvalOutcome {
            allowed: allowed_flag == 1,
            limit: policy.permit_limit(),
            remaining,
            used,
            retry_after_ticks,
            reset_after_ticks,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);
        conn.del::<_, ()>(&full_key)
            .await
            .map_err(|e| StorageError::ScriptFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_overrides_defaults() {
        let config = RedisConfig::new("redis://localhost:6380")
            .with_prefix("test:")
            .with_pool_size(5);

        assert_eq!(config.url, "redis://localhost:6380");
        assert_eq!(config.key_prefix, "test:");
        assert_eq!(config.pool_size, 5);
    }

    #[test]
    fn script_source_defines_both_algorithm_branches() {
        assert!(EVALUATE_SCRIPT.contains("is_token_bucket"));
        assert!(EVALUATE_SCRIPT.contains("HMGET"));
    }
}
