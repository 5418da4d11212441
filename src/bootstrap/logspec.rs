//! Logging spec resolution and parsing.
//!
//! A spec is a `:`-separated list of segments. A bare level sets the default
//! severity; `mod1,mod2=level` sets the level for those modules (tracing
//! targets). Example: `warning:peer_node::commands=debug`.

use std::collections::BTreeMap;
use std::fmt;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Severity used when nothing else is configured.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::INFO;

/// Parsed logging spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSpec {
    default: LevelFilter,
    modules: BTreeMap<String, LevelFilter>,
    /// Segments that could not be parsed and were skipped.
    rejected: Vec<String>,
}

impl Default for LoggingSpec {
    fn default() -> Self {
        Self {
            default: DEFAULT_LEVEL,
            modules: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }
}

/// Pick the effective spec: a non-empty override wins, then the configured
/// value, then the built-in default.
pub fn resolve(explicit_override: Option<&str>, configured: Option<&str>) -> LoggingSpec {
    let chosen = [explicit_override, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty());

    match chosen {
        Some(spec) => LoggingSpec::parse(spec),
        None => LoggingSpec::default(),
    }
}

/// Parse a single level name (case-insensitive).
pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "critical" | "error" => Some(LevelFilter::ERROR),
        "warning" | "warn" => Some(LevelFilter::WARN),
        "notice" | "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

impl LoggingSpec {
    /// Parse `spec`. Never fails: bad segments are recorded in
    /// [`rejected`](Self::rejected) and the rest still applies.
    pub fn parse(spec: &str) -> Self {
        let mut parsed = Self::default();

        for segment in split_segments(spec).into_iter().map(str::trim).filter(|s| !s.is_empty()) {
            match segment.split_once('=') {
                Some((modules, level)) => {
                    let names: Vec<&str> = modules
                        .split(',')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .collect();
                    match parse_level(level) {
                        Some(level) if !names.is_empty() && names.iter().all(|m| valid_module(m)) => {
                            for name in names {
                                parsed.modules.insert(name.to_string(), level);
                            }
                        }
                        _ => parsed.rejected.push(segment.to_string()),
                    }
                }
                None => match parse_level(segment) {
                    Some(level) => parsed.default = level,
                    None => parsed.rejected.push(segment.to_string()),
                },
            }
        }

        parsed
    }

    pub fn default_level(&self) -> LevelFilter {
        self.default
    }

    pub fn modules(&self) -> &BTreeMap<String, LevelFilter> {
        &self.modules
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Effective level for `module`: the longest configured prefix on a
    /// `::` boundary, else the default.
    pub fn level_for(&self, module: &str) -> LevelFilter {
        self.modules
            .iter()
            .filter(|(name, _)| {
                module == name.as_str()
                    || module
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .max_by_key(|(name, _)| name.len())
            .map(|(_, level)| *level)
            .unwrap_or(self.default)
    }

    /// Override the level of one module.
    pub fn set_module_level(&mut self, module: &str, level: LevelFilter) {
        self.modules.insert(module.trim().to_string(), level);
    }

    /// Directive string understood by [`EnvFilter`].
    pub fn directives(&self) -> String {
        let mut parts = vec![level_name(self.default).to_string()];
        parts.extend(
            self.modules
                .iter()
                .map(|(module, level)| format!("{module}={}", level_name(*level))),
        );
        parts.join(",")
    }

    /// Build the filter for this spec; falls back to the default level if
    /// the directives are somehow rejected.
    pub fn to_env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.directives())
            .unwrap_or_else(|_| EnvFilter::new(level_name(DEFAULT_LEVEL)))
    }
}

impl fmt::Display for LoggingSpec {
    /// Canonical spec form: module segments first, default level last.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (module, level) in &self.modules {
            write!(f, "{module}={}:", level_name(*level))?;
        }
        write!(f, "{}", level_name(self.default))
    }
}

/// Lower-case level name.
pub fn level_name(level: LevelFilter) -> &'static str {
    if level == LevelFilter::OFF {
        "off"
    } else if level == LevelFilter::ERROR {
        "error"
    } else if level == LevelFilter::WARN {
        "warn"
    } else if level == LevelFilter::INFO {
        "info"
    } else if level == LevelFilter::DEBUG {
        "debug"
    } else {
        "trace"
    }
}

/// Split on `:` separators while keeping `::` path separators intact.
fn split_segments(spec: &str) -> Vec<&str> {
    let bytes = spec.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            if bytes.get(i + 1) == Some(&b':') {
                i += 2;
                continue;
            }
            segments.push(&spec[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    segments.push(&spec[start..]);
    segments
}

fn valid_module(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-')
}
