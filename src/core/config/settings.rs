//! Process-wide key/value settings store.
//!
//! Two layers are merged at lookup time: environment variables under the
//! root prefix (highest precedence) and the flattened config file. Keys are
//! normalised so that `peer.localMspId`, `PEER_LOCALMSPID` and
//! `peer_localmspid` all address the same logical entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::load::expand_home;

/// Normalise a logical key: lower case, `_` folded into `.`.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', ".")
}

/// Read-only configuration store built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root_key: String,
    env: BTreeMap<String, String>,
    file: BTreeMap<String, toml::Value>,
    /// Config file the file layer came from, if any.
    source: Option<PathBuf>,
    /// Directory relative paths are resolved against.
    base_dir: PathBuf,
}

impl Settings {
    /// Build a store from already-parsed parts.
    ///
    /// `env_vars` may contain unrelated variables; only those carrying the
    /// `ROOTKEY_` prefix with a non-empty value are kept.
    pub fn new(
        root_key: &str,
        file: Option<toml::Value>,
        source: Option<PathBuf>,
        base_dir: PathBuf,
        env_vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let prefix = format!("{}_", root_key.to_ascii_uppercase());

        let env = env_vars
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(name, value)| {
                name.strip_prefix(&prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (normalize_key(rest), value))
            })
            .collect();

        let mut flat = BTreeMap::new();
        if let Some(value) = file {
            flatten("", value, &mut flat);
        }

        Self {
            root_key: root_key.to_string(),
            env,
            file: flat,
            source,
            base_dir,
        }
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// Path of the config file that was loaded, `None` when running on defaults.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether either layer defines `key`.
    pub fn is_set(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.env.contains_key(&key) || self.file.contains_key(&key)
    }

    /// String value of `key`; integers and booleans are rendered as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        let key = normalize_key(key);
        if let Some(value) = self.env.get(&key) {
            return Some(value.clone());
        }
        self.file.get(&key).and_then(value_as_string)
    }

    /// Like [`get_string`](Self::get_string) but falls back to `default`.
    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        let key = normalize_key(key);
        if let Some(value) = self.env.get(&key) {
            return value.trim().parse().ok();
        }
        match self.file.get(&key)? {
            toml::Value::Integer(i) => Some(*i),
            toml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let key = normalize_key(key);
        if let Some(value) = self.env.get(&key) {
            return parse_bool(value);
        }
        match self.file.get(&key)? {
            toml::Value::Boolean(b) => Some(*b),
            toml::Value::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Path value of `key`: `~` expanded, relative paths anchored at the
    /// config file's directory.
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        let raw = self.get_string(key).filter(|v| !v.is_empty())?;
        Some(self.resolve_path(&raw))
    }

    /// Anchor `raw` the same way [`get_path`](Self::get_path) does.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = expand_home(raw);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    /// Value of a key that a command-line flag is bound to.
    ///
    /// Precedence: environment, then a non-empty `flag` value, then the file.
    pub fn get_bound(&self, key: &str, flag: Option<&str>) -> Option<String> {
        let normalized = normalize_key(key);
        if let Some(value) = self.env.get(&normalized) {
            return Some(value.clone());
        }
        if let Some(flag) = flag.filter(|f| !f.is_empty()) {
            return Some(flag.to_string());
        }
        self.file.get(&normalized).and_then(value_as_string)
    }
}

fn flatten(prefix: &str, value: toml::Value, out: &mut BTreeMap<String, toml::Value>) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(normalize_key(prefix), leaf);
            }
        }
    }
}

fn value_as_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
logging_level = "warning"

[logging]
peer = "info"
format = "compact"

[peer]
localMspId = "Org1MSP"
mspConfigPath = "msp"
workerThreads = 4
tls = { enabled = true }
"#;

    fn settings(env: &[(&str, &str)]) -> Settings {
        let file: toml::Value = toml::from_str(FILE).unwrap();
        Settings::new(
            "core",
            Some(file),
            Some(PathBuf::from("/etc/peer/core.toml")),
            PathBuf::from("/etc/peer"),
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn normalize_folds_case_and_separators() {
        assert_eq!(normalize_key("peer.localMspId"), "peer.localmspid");
        assert_eq!(normalize_key("PEER_LOCALMSPID"), "peer.localmspid");
        assert_eq!(normalize_key("logging_level"), "logging.level");
    }

    #[test]
    fn file_values_are_flattened() {
        let s = settings(&[]);
        assert_eq!(s.get_string("logging.peer").as_deref(), Some("info"));
        assert_eq!(s.get_string("peer.localMspId").as_deref(), Some("Org1MSP"));
        assert_eq!(s.get_bool("peer.tls.enabled"), Some(true));
        assert_eq!(s.get_int("peer.workerThreads"), Some(4));
    }

    #[test]
    fn env_overrides_file() {
        let s = settings(&[("CORE_PEER_LOCALMSPID", "Org2MSP"), ("CORE_PEER_WORKERTHREADS", "8")]);
        assert_eq!(s.get_string("peer.localMspId").as_deref(), Some("Org2MSP"));
        assert_eq!(s.get_int("peer.workerThreads"), Some(8));
    }

    #[test]
    fn env_alone_sets_key_missing_from_file() {
        let s = settings(&[("CORE_PEER_ADDRESS", "127.0.0.1:9051")]);
        assert_eq!(s.get_string("peer.address").as_deref(), Some("127.0.0.1:9051"));
        assert!(s.is_set("peer.address"));
    }

    #[test]
    fn unrelated_and_empty_env_ignored() {
        let s = settings(&[("HOME", "/root"), ("CORE_PEER_LOCALMSPID", ""), ("CORE_", "x")]);
        assert_eq!(s.get_string("peer.localMspId").as_deref(), Some("Org1MSP"));
        assert!(!s.is_set("home"));
    }

    #[test]
    fn integers_render_as_strings() {
        let s = settings(&[]);
        assert_eq!(s.get_string("peer.workerThreads").as_deref(), Some("4"));
    }

    #[test]
    fn bad_env_int_is_none() {
        let s = settings(&[("CORE_PEER_WORKERTHREADS", "many")]);
        assert_eq!(s.get_int("peer.workerThreads"), None);
    }

    #[test]
    fn relative_paths_anchor_at_config_dir() {
        let s = settings(&[]);
        assert_eq!(s.get_path("peer.mspConfigPath"), Some(PathBuf::from("/etc/peer/msp")));
    }

    #[test]
    fn absolute_paths_unchanged() {
        let s = settings(&[("CORE_PEER_MSPCONFIGPATH", "/opt/msp")]);
        assert_eq!(s.get_path("peer.mspConfigPath"), Some(PathBuf::from("/opt/msp")));
    }

    #[test]
    fn bound_key_precedence() {
        // file only
        let s = settings(&[]);
        assert_eq!(s.get_bound("logging_level", None).as_deref(), Some("warning"));
        // flag beats file
        assert_eq!(s.get_bound("logging_level", Some("debug")).as_deref(), Some("debug"));
        // empty flag is ignored
        assert_eq!(s.get_bound("logging_level", Some("")).as_deref(), Some("warning"));
        // env beats flag
        let s = settings(&[("CORE_LOGGING_LEVEL", "error")]);
        assert_eq!(s.get_bound("logging_level", Some("debug")).as_deref(), Some("error"));
    }

    #[test]
    fn get_string_or_uses_default() {
        let s = settings(&[]);
        assert_eq!(s.get_string_or("peer.id", "peer0"), "peer0");
        assert_eq!(s.get_string_or("logging.format", "full"), "compact");
    }
}
