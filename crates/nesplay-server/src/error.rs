//! Server error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The ROM directory does not exist.
    #[error("rom directory not found: {}", .0.display())]
    RomDirMissing(PathBuf),
    /// The ROM path exists but is not a directory.
    #[error("rom path is not a directory: {}", .0.display())]
    RomDirNotDirectory(PathBuf),
    /// The ROM search pattern could not be compiled.
    #[error("invalid rom pattern: {0}")]
    RomPattern(#[from] glob::PatternError),
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested `host:port`.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
    /// The global metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_dir_messages_include_path() {
        let err = ServerError::RomDirMissing(PathBuf::from("/no/such/roms"));
        assert_eq!(err.to_string(), "rom directory not found: /no/such/roms");
        let err = ServerError::RomDirNotDirectory(PathBuf::from("/etc/hosts"));
        assert!(err.to_string().contains("/etc/hosts"));
    }

    #[test]
    fn bind_error_keeps_source() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:5000".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().starts_with("failed to bind 0.0.0.0:5000"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn pattern_error_converts() {
        let pattern_err = glob::Pattern::new("[").unwrap_err();
        let err: ServerError = pattern_err.into();
        assert!(matches!(err, ServerError::RomPattern(_)));
    }
}
