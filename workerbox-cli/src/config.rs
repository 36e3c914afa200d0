//! CLI logging configuration

use tracing::Level;

/// Log targets emitted by the sandbox crates
pub const TARGETS: [&str; 4] = [
    "workerbox::blueprint",
    "workerbox::linker",
    "workerbox::loader",
    "workerbox::cli",
];

/// Per-target log levels
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub blueprint: Option<Level>,
    pub linker: Option<Level>,
    pub loader: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            blueprint: None,
            linker: None,
            loader: None,
        }
    }
}

impl LogConfig {
    pub fn new(global: Level) -> Self {
        Self {
            global,
            ..Self::default()
        }
    }

    /// Get log level for a specific target
    pub fn level_for(&self, target: &str) -> Level {
        match target {
            "workerbox::blueprint" => self.blueprint.unwrap_or(self.global),
            "workerbox::linker" => self.linker.unwrap_or(self.global),
            "workerbox::loader" => self.loader.unwrap_or(self.global),
            _ => self.global,
        }
    }
}

/// Parse a level name; `silent` maps to errors only
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "silent" | "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
