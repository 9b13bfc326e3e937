//! Routes parsed commands to the store, the config and the snapshot scanner

use crate::{
    command::Command,
    config::Config,
    error::Result,
    pattern::Pattern,
    protocol::Frame,
    snapshot::SnapshotScanner,
    store::{MemoryStore, Store},
};
use std::sync::Arc;

/// Stateless command router; cheap to clone into every connection task
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<MemoryStore>,
    config: Arc<Config>,
    snapshot: Arc<SnapshotScanner>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<MemoryStore>,
        config: Arc<Config>,
        snapshot: Arc<SnapshotScanner>,
    ) -> Self {
        Self {
            store,
            config,
            snapshot,
        }
    }

    /// Parse a request frame and execute it. Command-level failures become
    /// `-ERR` replies.
    pub async fn handle_frame(&self, frame: Frame) -> Frame {
        let command = match Command::from_frame(frame) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(error = %e, "rejected request");
                return Frame::error(&e);
            }
        };

        tracing::debug!(command = command.name(), "executing");
        match self.execute(command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(error = %e, "command failed");
                Frame::error(&e)
            }
        }
    }

    /// Execute a parsed command
    pub async fn execute(&self, command: Command) -> Result<Frame> {
        match command {
            Command::Ping => Ok(Frame::Simple("PONG".to_string())),
            Command::Echo { data } => Ok(Frame::Bulk(data)),
            Command::Set {
                key,
                value,
                expiry_ms,
            } => {
                self.store.set(key, value, expiry_ms.unwrap_or(0)).await?;
                Ok(Frame::ok())
            }
            Command::Get { key } => match self.store.get(&key).await? {
                Some(value) => Ok(Frame::bulk(value)),
                None => Ok(Frame::Null),
            },
            Command::ConfigGet { param } => {
                let value = self.config.get(&param)?.to_string();
                Ok(Frame::Array(vec![Frame::bulk(param), Frame::bulk(value)]))
            }
            Command::Keys { pattern } => {
                let pattern = Pattern::new(&pattern);
                let keys = self.snapshot.keys(&pattern).await?;
                Ok(Frame::Array(keys.into_iter().map(Frame::Bulk).collect()))
            }
        }
    }
}
