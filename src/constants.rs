// src/constants.rs

/// The default name of the proxy configuration document.
pub const DEFAULT_CONFIG_FILENAME: &str = "shell-proxy.json";

/// The directory (under the system config dir) searched for the configuration document.
pub const CONFIG_DIR_NAME: &str = "shell-proxy";

/// Environment variable holding the active namespace when `--namespace` is not given.
pub const NAMESPACE_ENV_VAR: &str = "SHELL_PROXY_NAMESPACE";

/// Separator between path segments of a proxy identifier.
pub const PATH_SEPARATOR: char = '/';

/// Exit code reported when the final command was killed by a signal (e.g. Ctrl+C).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
