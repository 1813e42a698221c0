// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Redis cache tier.

use std::{collections::HashMap, fmt, marker::PhantomData, time::Duration};

use redis::{AsyncCommands, RedisResult, aio::ConnectionManager};
use strata_tier::{CacheTier, Codec, Error, JsonCodec};

use crate::RedisConfig;

/// A cache tier storing encoded values in Redis.
///
/// The tier holds a [`ConnectionManager`], which multiplexes commands over one connection and
/// reconnects transparently. Cloning the tier shares that connection.
///
/// Misses are reported as `Ok(None)` from [`get`](CacheTier::get) and `Ok(false)` from
/// [`delete`](CacheTier::delete). In [`batch_get`](CacheTier::batch_get), entries that fail to
/// decode or hold a non-string Redis type are treated as misses.
pub struct RedisTier<V, C = JsonCodec> {
    conn: ConnectionManager,
    codec: C,
    key_prefix: String,
    response_timeout: Duration,
    _value: PhantomData<fn() -> V>,
}

impl<V, C: Clone> Clone for RedisTier<V, C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            codec: self.codec.clone(),
            key_prefix: self.key_prefix.clone(),
            response_timeout: self.response_timeout,
            _value: PhantomData,
        }
    }
}

impl<V, C: fmt::Debug> fmt::Debug for RedisTier<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTier")
            .field("codec", &self.codec)
            .field("key_prefix", &self.key_prefix)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

impl<V, C> RedisTier<V, C>
where
    C: Codec<V>,
{
    /// Connects to the server described by `config`, encoding values with `codec`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the URL is invalid or the server cannot be reached within
    /// the configured connection timeout.
    pub async fn connect(config: &RedisConfig, codec: C) -> Result<Self, Error> {
        let client = redis::Client::open(config.url.as_str()).map_err(Error::backend)?;
        let conn = tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(Error::backend)?
            .map_err(Error::backend)?;

        tracing::debug!(redis.url = %config.url, "connected to redis");

        Ok(Self {
            conn,
            codec,
            key_prefix: config.key_prefix.clone(),
            response_timeout: config.response_timeout,
            _value: PhantomData,
        })
    }

    /// Checks that the server is reachable.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the server does not answer.
    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    fn redis_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }

    /// Runs a Redis round trip under the response timeout.
    async fn bounded<T>(&self, op: impl Future<Output = RedisResult<T>>) -> Result<T, Error> {
        tokio::time::timeout(self.response_timeout, op)
            .await
            .map_err(Error::backend)?
            .map_err(Error::backend)
    }
}

impl<V, C> CacheTier<V> for RedisTier<V, C>
where
    V: Clone + Send + Sync,
    C: Codec<V>,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = self.bounded(conn.get(self.redis_key(key))).await?;
        bytes.map(|bytes| self.codec.decode(&bytes)).transpose()
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        let bytes = self.codec.encode(&value)?;
        let mut conn = self.conn.clone();
        let redis_key = self.redis_key(key);
        match expiry_millis(ttl) {
            Some(millis) => self.bounded(conn.pset_ex::<_, _, ()>(redis_key, bytes, millis)).await,
            None => self.bounded(conn.set::<_, _, ()>(redis_key, bytes)).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let mut conn = self.conn.clone();
        let removed: u64 = self.bounded(conn.del(self.redis_key(key))).await?;
        Ok(removed > 0)
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, V>, Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        // MGET answers nil for keys holding a non-string value, where a pipelined GET would
        // fail the whole batch with WRONGTYPE.
        let mut mget = redis::cmd("MGET");
        for key in keys {
            mget.arg(self.redis_key(key));
        }

        let mut conn = self.conn.clone();
        let replies: Vec<Option<Vec<u8>>> = self.bounded(mget.query_async(&mut conn)).await?;

        let mut found = HashMap::with_capacity(keys.len());
        for (key, bytes) in keys.iter().zip(replies) {
            let Some(bytes) = bytes else { continue };
            match self.codec.decode(&bytes) {
                Ok(value) => {
                    found.insert(key.clone(), value);
                }
                Err(error) => {
                    tracing::warn!(cache.key = %key, error = %error, "undecodable redis entry treated as a miss");
                }
            }
        }
        Ok(found)
    }

    async fn batch_set(&self, items: &HashMap<String, V>, ttl: Duration) -> Result<(), Error> {
        if items.is_empty() {
            return Ok(());
        }

        let millis = expiry_millis(ttl);
        let mut pipe = redis::pipe();
        for (key, value) in items {
            let bytes = self.codec.encode(value)?;
            match millis {
                Some(millis) => pipe.pset_ex(self.redis_key(key), bytes, millis).ignore(),
                None => pipe.set(self.redis_key(key), bytes).ignore(),
            };
        }

        let mut conn = self.conn.clone();
        let () = self.bounded(pipe.query_async(&mut conn)).await?;
        Ok(())
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    let mut redis_key = String::with_capacity(prefix.len() + key.len());
    redis_key.push_str(prefix);
    redis_key.push_str(key);
    redis_key
}

/// Converts a TTL to the `PX` argument; `None` means the entry never expires.
fn expiry_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    // Sub-millisecond expiries round up so they do not turn into "never".
    Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
}
