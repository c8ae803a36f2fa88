use maxminddb::Reader;
use memmap2::Mmap;
use std::{
    fs::File,
    io,
    net::IpAddr,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::value::Value;

/// Failure to open a geolocation database. The handle must not be used.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("database file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read database {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid database {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Failure of a single IP lookup. Neither variant poisons the handle.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid IP address: {0}")]
    Address(String),

    #[error("database lookup failed: {0}")]
    Database(String),

    #[error("no geolocation database is open")]
    Unavailable,
}

/// Anything that can resolve an IP string to a record.
///
/// `Ok(None)` means the query was valid but the database holds no record for
/// the address.
pub trait GeoSource {
    fn lookup_ip(&self, ip: &str) -> Result<Option<Value>, LookupError>;
}

/// Read-only handle over a memory-mapped MaxMind DB file.
///
/// Nothing mutates the mapping after `open`, so one handle can serve
/// concurrent lookups from any number of threads.
pub struct DatabaseHandle {
    reader: Reader<Mmap>,
    path: PathBuf,
}

impl DatabaseHandle {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| io_error(&path, e))?;
        // SAFETY: the file is only ever read through this mapping. Replacing a
        // database must be done by renaming a new file into place, never by
        // rewriting the mapped one.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(&path, e))?;

        let reader = Reader::from_source(mmap).map_err(|e| OpenError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        info!(
            "Opened {} database from {:?} ({} nodes)",
            reader.metadata.database_type, path, reader.metadata.node_count
        );
        Ok(Self { reader, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Edition name from the database metadata, e.g. `GeoLite2-City`.
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }

    /// Unmaps the database.
    pub fn close(self) {
        debug!("Closing database {:?}", self.path);
    }
}

impl GeoSource for DatabaseHandle {
    fn lookup_ip(&self, ip: &str) -> Result<Option<Value>, LookupError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| LookupError::Address(ip.to_string()))?;

        debug!("Looking up IP: {}", addr);

        let record: Option<Value> = self.reader.lookup(addr).map_err(|e| {
            error!("Database lookup failed for {} in {:?}: {}", addr, self.path, e);
            LookupError::Database(e.to_string())
        })?;

        if record.is_none() {
            debug!("No entry for IP: {}", addr);
        }
        Ok(record)
    }
}

/// Closes `handle` if there is one.
pub fn close(handle: Option<DatabaseHandle>) {
    if let Some(handle) = handle {
        handle.close();
    }
}

fn io_error(path: &Path, source: io::Error) -> OpenError {
    match source.kind() {
        io::ErrorKind::NotFound => OpenError::NotFound(path.to_path_buf()),
        _ => OpenError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("GeoLite2-City.mmdb");
        match DatabaseHandle::open(&missing) {
            Err(OpenError::NotFound(path)) => assert_eq!(path, missing),
            Err(other) => panic!("expected NotFound, got {other}"),
            Ok(_) => panic!("opened a file that does not exist"),
        }
    }

    #[test]
    fn test_open_garbage_file_is_corrupt() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x42u8; 4096]).unwrap();
        file.flush().unwrap();

        let err = DatabaseHandle::open(file.path()).err().unwrap();
        assert!(matches!(err, OpenError::Corrupt { .. }), "got {err}");
    }

    #[test]
    fn test_open_directory_is_not_a_database() {
        let dir = tempdir().unwrap();
        assert!(DatabaseHandle::open(dir.path()).is_err());
    }

    #[test]
    fn test_close_without_handle_is_noop() {
        close(None);
    }

    #[test]
    fn test_handle_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DatabaseHandle>();
    }
}
