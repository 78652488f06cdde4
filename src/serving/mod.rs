pub mod launch;
pub mod readiness;

pub use launch::{LaunchConfig, LaunchError, ServerLauncher};
pub use readiness::wait_until_ready;
