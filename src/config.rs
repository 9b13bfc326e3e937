//! Read-only configuration parameters exposed through `CONFIG GET`

use crate::error::{RedliteError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The two parameters clients can query. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub dir: String,
    pub dbfilename: String,
}

impl Config {
    pub fn new(dir: impl Into<String>, dbfilename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            dbfilename: dbfilename.into(),
        }
    }

    /// Look up a parameter by name
    pub fn get(&self, param: &str) -> Result<&str> {
        match param {
            "dir" => Ok(&self.dir),
            "dbfilename" => Ok(&self.dbfilename),
            other => Err(RedliteError::UnknownConfigParam(other.to_string())),
        }
    }

    /// Full path of the snapshot file, `dir/dbfilename`
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("/tmp/redis-data", "dump.rdb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_get() {
        let config = Config::new("/tmp/redis-data", "dump.rdb");
        assert_eq!(config.get("dir").unwrap(), "/tmp/redis-data");
        assert_eq!(config.get("dbfilename").unwrap(), "dump.rdb");

        let err = config.get("maxmemory").unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter 'maxmemory'");
    }

    #[test]
    fn test_snapshot_path() {
        let config = Config::new("/var/lib/redlite", "snap.rdb");
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/redlite/snap.rdb")
        );
    }
}
