/// Centralized argument handling for walletscope
///
/// Consolidates command-line argument storage and debug flag checking so that
/// logging and the analytics pipeline can query flags without re-parsing
/// `env::args()` everywhere.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
/// Thread-safe singleton that stores arguments for access throughout the application
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// RPC module debug mode
pub fn is_debug_rpc_enabled() -> bool {
    has_arg("--debug-rpc")
}

/// Analytics pipeline debug mode (balance deltas, classification, aggregation)
pub fn is_debug_analytics_enabled() -> bool {
    has_arg("--debug-analytics")
}

/// Metadata resolver debug mode
pub fn is_debug_metadata_enabled() -> bool {
    has_arg("--debug-metadata")
}

/// Global verbose mode (implies every debug flag)
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}
