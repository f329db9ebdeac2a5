//! CLI command implementations

pub mod config;
pub mod init;
pub mod links;
pub mod projects;
pub mod versions;

pub use config::execute as config;
pub use init::execute as init;
pub use links::execute as links;
pub use projects::execute as projects;
pub use versions::execute as versions;

use console::Emoji;

pub(crate) static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
pub(crate) static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");
