use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Raw catalog dump the corpus snapshot is built from
    CatalogSnapshot,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::CatalogSnapshot => write!(f, "catalog:snapshot"),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Commands processed in order by the cache writer task
enum CacheCommand {
    Set {
        key: String,
        value: String,
        ttl: Option<u64>,
    },
    /// Acknowledged once every earlier write has been applied and the key removed
    Delete {
        key: String,
        done: oneshot::Sender<AppResult<()>>,
    },
}

/// Shared cache tier in Redis
///
/// Reads go straight to Redis. Writes and deletes are funneled through one
/// background task so a delete can never be overtaken by an older write.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheCommand>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache and spawns its background writer
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(command) = write_rx.recv() => {
                    Self::apply(&client, command).await;
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    write_rx.close();
                    while let Some(command) = write_rx.recv().await {
                        Self::apply(&client, command).await;
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, command: CacheCommand) {
        match command {
            CacheCommand::Set { key, value, ttl } => {
                if let Err(e) = Self::write_to_redis(client, &key, value, ttl).await {
                    tracing::error!(error = %e, key = %key, "Failed to write to Redis cache");
                }
            }
            CacheCommand::Delete { key, done } => {
                let result = Self::delete_from_redis(client, &key).await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, key = %key, "Failed to delete from Redis cache");
                }
                let _ = done.send(result);
            }
        }
    }

    async fn write_to_redis(
        client: &Client,
        key: &str,
        value: String,
        ttl: Option<u64>,
    ) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete_from_redis(client: &Client, key: &str) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Retrieves and deserializes a value, `None` when the key is absent
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a write without waiting for Redis
    ///
    /// `ttl` of `None` stores the value without expiry.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<u64>) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let command = CacheCommand::Set {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if self.write_tx.send(command).is_err() {
            tracing::error!("Cache writer is gone, dropping write");
        }
    }

    /// Removes a key after all previously queued writes have landed
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let (done, ack) = oneshot::channel();
        self.write_tx
            .send(CacheCommand::Delete {
                key: key.to_string(),
                done,
            })
            .map_err(|_| AppError::Internal("Cache writer is gone".to_string()))?;

        ack.await
            .map_err(|_| AppError::Internal("Cache writer dropped delete".to_string()))?
    }
}
