//! Redis-protocol remote store (Redis, Valkey, KeyDB).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client, IntoConnectionInfo};
use tracing::{info, warn};

use super::{ttl_seconds, RemoteStore, RemoteTtl};
use crate::error::RemoteError;

/// Connection parameters for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// `host:port` addresses, tried in order
    pub addrs: Vec<String>,
    pub password: Option<String>,
    pub db: i64,
    /// Per-address connect timeout
    pub connect_timeout: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            addrs: Vec::new(),
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

pub struct RedisStore {
    connection: ConnectionManager,
    addr: String,
}

impl RedisStore {
    /// Connects to the first reachable address in `options.addrs`.
    ///
    /// Fails immediately when the address list is empty and with the last
    /// connection error when no address answers.
    pub async fn connect(options: &RedisOptions) -> Result<Self, RemoteError> {
        if options.addrs.is_empty() {
            return Err(RemoteError::Connection("no addresses configured".to_string()));
        }

        let mut last_error = None;
        for addr in &options.addrs {
            match Self::connect_one(addr, options).await {
                Ok(connection) => {
                    info!(addr = %addr, db = options.db, "Connected to remote store");
                    return Ok(Self {
                        connection,
                        addr: addr.clone(),
                    });
                }
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Remote store address unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RemoteError::Connection("unreachable".to_string())))
    }

    async fn connect_one(
        addr: &str,
        options: &RedisOptions,
    ) -> Result<ConnectionManager, RemoteError> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };
        let mut info = url.into_connection_info()?;
        info.redis.db = options.db;
        if let Some(password) = options.password.as_ref().filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.clone());
        }

        let client = Client::open(info)?;
        match tokio::time::timeout(options.connect_timeout, ConnectionManager::new(client)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RemoteError::Connection(format!(
                "connect to {} timed out after {:?}",
                addr, options.connect_timeout
            ))),
        }
    }

    /// The address this store is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), RemoteError> {
        let mut conn = self.connection.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, RemoteError> {
        let mut conn = self.connection.clone();
        let mut command = cmd("SET");
        command.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            command.arg("EX").arg(ttl_seconds(ttl));
        }
        // "OK" when written, nil when the key already exists
        let reply: Option<String> = command.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<RemoteTtl, RemoteError> {
        let mut conn = self.connection.clone();
        let seconds: i64 = conn.ttl(key).await?;
        Ok(RemoteTtl::from_reply(seconds))
    }

    async fn del(&self, key: &str) -> Result<(), RemoteError> {
        let mut conn = self.connection.clone();
        let _removed: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, RemoteError> {
        let mut conn = self.connection.clone();
        let seconds = i64::try_from(ttl_seconds(ttl)).unwrap_or(i64::MAX);
        let updated: i64 = conn.expire(key, seconds).await?;
        Ok(updated == 1)
    }
}
