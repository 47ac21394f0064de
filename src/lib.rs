// Core modules
pub mod common;
pub mod system;
pub mod install;
pub mod doctor;
pub mod cli;

// Re-export commonly used types
pub use common::{Config, DevMode, Layout, SetupError, Result};
pub use system::{DevExecutor, Executor, Invocation, SystemExecutor, TargetUser};
pub use install::{InstallOptions, InstallSummary, Installer, Step};
pub use doctor::{CheckReport, CheckStatus, Doctor};
