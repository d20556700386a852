//! Debug infrastructure with per-module loggers.
//!
//! Control via the DEBUG environment variable:
//! - `DEBUG=*` - Enable all loggers
//! - `DEBUG=parse` - Enable only the evaluation tracer
//! - `DEBUG=parse,lang` - Enable multiple
//!
//! `DEBUG_VERBOSITY=2` additionally enables per-attempt detail lines.

use std::cell::Cell;
use std::collections::HashSet;
use std::env;
use std::sync::OnceLock;

// ============================================================================
// Configuration
// ============================================================================

struct Config {
    all: bool,
    names: HashSet<String>,
    detail: bool,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let spec = env::var("DEBUG").unwrap_or_default();
        let all = matches!(spec.as_str(), "*" | "1" | "true");
        let names = if all {
            HashSet::new()
        } else {
            spec.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let detail = env::var("DEBUG_VERBOSITY")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .map(|v| v >= 2)
            .unwrap_or(false);
        Config { all, names, detail }
    })
}

// ============================================================================
// Logger
// ============================================================================

/// A named logger writing indented trace lines to stderr.
///
/// Disabled loggers are free apart from a boolean check; the `log!` /
/// `log_detail!` macros skip message formatting entirely when disabled.
pub struct Logger {
    name: &'static str,
    enabled: bool,
    detail: bool,
    indent: Cell<usize>,
}

impl Logger {
    pub const fn disabled() -> Self {
        Self {
            name: "",
            enabled: false,
            detail: false,
            indent: Cell::new(0),
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn detail_enabled(&self) -> bool {
        self.enabled && self.detail
    }

    pub fn log(&self, msg: &str) {
        if self.enabled {
            eprintln!("{}[{}] {}", "  ".repeat(self.indent.get()), self.name, msg);
        }
    }

    pub fn detail(&self, msg: &str) {
        if self.detail_enabled() {
            eprintln!("{}[{}] {}", "  ".repeat(self.indent.get()), self.name, msg);
        }
    }

    #[inline]
    pub fn push_indent(&self) {
        if self.enabled {
            self.indent.set(self.indent.get() + 1);
        }
    }

    #[inline]
    pub fn pop_indent(&self) {
        if self.enabled {
            self.indent.set(self.indent.get().saturating_sub(1));
        }
    }
}

/// Create a logger. The name must be a static string.
pub fn create_logger(name: &'static str) -> Logger {
    let cfg = config();
    if cfg.all || cfg.names.contains(name) {
        Logger {
            name,
            enabled: true,
            detail: cfg.detail,
            indent: Cell::new(0),
        }
    } else {
        Logger::disabled()
    }
}

// ============================================================================
// Macros - avoid format! cost when disabled
// ============================================================================

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.log(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_detail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.detail_enabled() {
            $logger.detail(&format!($($arg)*));
        }
    };
}
