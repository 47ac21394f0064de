use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("This command must be run as root (try: sudo mvs-setup install)")]
    NotRoot,

    #[error("Unsupported architecture: expected {expected}, found {found}")]
    UnsupportedArch { expected: String, found: String },

    #[error("Package file not found: {0}")]
    PackageNotFound(PathBuf),

    #[error("No SDK package matching {prefix}*.deb in {dir}")]
    NoPackageFound { prefix: String, dir: PathBuf },

    #[error("{0} is a runtime-only package without Python bindings; download the full MVS SDK")]
    RuntimePackage(PathBuf),

    #[error("Command `{program}` failed ({status}): {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to start `{program}`: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Expected installed file is missing: {0}")]
    MissingInstalledFile(PathBuf),

    #[error("Refusing to replace {0}: not a symlink")]
    LinkBlocked(PathBuf),

    #[error("Samples link {0} does not resolve to a directory")]
    DanglingLink(PathBuf),

    #[error("{0}: mvs-setup begin marker without an end marker, fix it by hand")]
    UnbalancedMarkers(PathBuf),

    #[error("No Python interpreter found for capability setup")]
    NoInterpreter,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SetupError>;
