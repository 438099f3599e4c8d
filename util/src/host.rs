//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable pointing at the simulator software root.
pub const SW_ROOT_ENV_VAR: &str = "SIM_SW_ROOT";

/// Retrieve the software root directory.
///
/// This is the value of `SIM_SW_ROOT` if it is set, otherwise the current
/// working directory.
pub fn get_sw_root() -> std::io::Result<PathBuf> {
    match env::var_os(SW_ROOT_ENV_VAR) {
        Some(root) => Ok(PathBuf::from(root)),
        None => env::current_dir()
    }
}

/// Short description of the host platform, used in the startup banner.
pub fn get_platform() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
