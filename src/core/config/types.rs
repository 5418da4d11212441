//! Well-known configuration keys and the resolved views built from them.
//!
//! The raw store is [`Settings`]; the structs here are what the bootstrap
//! sequence and the commands actually consume.

use std::path::PathBuf;

use super::settings::Settings;

// ── Keys ────────────────────────────────────────────────────────────────────

/// Bound to `--logging-level`; also settable as `CORE_LOGGING_LEVEL`.
pub const LOGGING_LEVEL: &str = "logging_level";
pub const LOGGING_PEER: &str = "logging.peer";
pub const LOGGING_FORMAT: &str = "logging.format";
pub const LOGGING_FILE: &str = "logging.file";
/// `stderr`, `stdout`, or a file path; `logging.file` wins when both are set.
pub const LOGGING_OUTPUT: &str = "logging.output";

pub const PEER_ID: &str = "peer.id";
pub const PEER_ADDRESS: &str = "peer.address";
pub const PEER_LOCAL_MSP_ID: &str = "peer.localMspId";
pub const PEER_MSP_CONFIG_PATH: &str = "peer.mspConfigPath";
pub const PEER_WORKER_THREADS: &str = "peer.workerThreads";
pub const PEER_FILE_SYSTEM_PATH: &str = "peer.fileSystemPath";

// ── Defaults ────────────────────────────────────────────────────────────────

const DEFAULT_PEER_ID: &str = "peer0";
const DEFAULT_PEER_ADDRESS: &str = "0.0.0.0:7051";
const DEFAULT_MSP_ID: &str = "DEFAULT";
const DEFAULT_MSP_DIR: &str = "msp";
const DEFAULT_FILE_SYSTEM_PATH: &str = "/var/lib/peer/production";
const DEFAULT_LOG_FORMAT: &str = "full";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogSink {
    #[default]
    Stderr,
    Stdout,
    /// Append to a file, created if missing.
    File(PathBuf),
}

/// Logging-related settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Peer logging spec from the file/env (`logging.peer`), possibly empty.
    pub peer_spec: String,
    /// Output format name (`full` or `compact`).
    pub format: String,
    pub output: LogSink,
}

impl LoggingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            peer_spec: settings.get_string(LOGGING_PEER).unwrap_or_default(),
            format: settings.get_string_or(LOGGING_FORMAT, DEFAULT_LOG_FORMAT),
            output: log_sink(settings),
        }
    }
}

fn log_sink(settings: &Settings) -> LogSink {
    if let Some(path) = settings.get_path(LOGGING_FILE) {
        return LogSink::File(path);
    }
    let raw = settings.get_string(LOGGING_OUTPUT).unwrap_or_default();
    match raw.trim() {
        "" => LogSink::Stderr,
        name if name.eq_ignore_ascii_case("stderr") => LogSink::Stderr,
        name if name.eq_ignore_ascii_case("stdout") => LogSink::Stdout,
        path => LogSink::File(settings.resolve_path(path)),
    }
}

/// Node-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub id: String,
    pub address: String,
    /// Organisation the local identity must belong to.
    pub local_msp_id: String,
    /// Directory holding the identity material (already anchored).
    pub msp_config_path: PathBuf,
    /// Requested runtime worker threads; `0` means "use available cores".
    pub worker_threads: usize,
    pub file_system_path: PathBuf,
}

impl PeerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            id: settings.get_string_or(PEER_ID, DEFAULT_PEER_ID),
            address: settings.get_string_or(PEER_ADDRESS, DEFAULT_PEER_ADDRESS),
            local_msp_id: settings.get_string_or(PEER_LOCAL_MSP_ID, DEFAULT_MSP_ID),
            msp_config_path: settings
                .get_path(PEER_MSP_CONFIG_PATH)
                .unwrap_or_else(|| settings.resolve_path(DEFAULT_MSP_DIR)),
            worker_threads: settings
                .get_int(PEER_WORKER_THREADS)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
            file_system_path: settings
                .get_path(PEER_FILE_SYSTEM_PATH)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_SYSTEM_PATH)),
        }
    }
}
