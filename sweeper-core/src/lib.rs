pub mod config;
pub mod error;
pub mod liveness;
pub mod mods;
pub mod registry;
pub mod remove;
pub mod report;
pub mod session;
pub mod usage;

use colored::Colorize;

pub use config::AnalysisConfig;
pub use error::{ConfigError, DeleteError, RegistryError, RemovalError, ReportError};
pub use liveness::{AssetSet, Liveness, classify};
pub use mods::discover_mods;
pub use registry::AssetRegistry;
pub use remove::{AssetDeleter, BatchRemover, FailurePolicy, RemovalOutcome};
pub use report::{ReportData, ReportFormat, save_report};
pub use session::{Session, remove_assets};
pub use usage::UsageReport;

pub fn print_banner() {
    println!(
        "{} {}",
        "sweeper".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!(
        "{}",
        "finds content nothing live depends on".bright_black()
    );
    println!();
}
