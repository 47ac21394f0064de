use crate::common::{Layout, Result, SetupError};
use crate::system::{Executor, Invocation};
use std::path::{Path, PathBuf};

/// GigE discovery needs raw sockets; the SDK also adjusts interface settings.
pub const RAW_SOCKET_CAPS: &str = "cap_net_raw,cap_net_admin+eip";

/// Resolve interpreter names or paths to real binaries, following symlinks.
///
/// Capabilities can only be set on regular files, so `python3` is chased to
/// e.g. `/usr/bin/python3.10`. Duplicates collapse to one entry.
pub fn resolve_interpreters(
    exec: &dyn Executor,
    layout: &Layout,
    interpreters: &[String],
    venv: Option<&Path>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for entry in interpreters {
        let path = Path::new(entry);
        if path.is_absolute() {
            candidates.push(layout.resolve(path));
        } else if let Some(found) = exec.which(entry) {
            candidates.push(found);
        } else {
            tracing::warn!("Interpreter {} not found on PATH", entry);
        }
    }
    if let Some(venv) = venv {
        candidates.push(layout.resolve(&venv.join("bin").join("python")));
    }

    let mut resolved: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        match std::fs::canonicalize(&candidate) {
            Ok(real) => {
                if !resolved.contains(&real) {
                    resolved.push(real);
                }
            }
            Err(e) => tracing::warn!("Skipping {}: {}", candidate.display(), e),
        }
    }
    resolved
}

pub fn grant_raw_socket(exec: &dyn Executor, interpreters: &[PathBuf]) -> Result<()> {
    if interpreters.is_empty() {
        return Err(SetupError::NoInterpreter);
    }
    for interpreter in interpreters {
        exec.run_checked(
            &Invocation::new("setcap")
                .arg(RAW_SOCKET_CAPS)
                .arg(interpreter.display().to_string()),
        )?;
        tracing::info!("Granted {} on {}", RAW_SOCKET_CAPS, interpreter.display());
    }
    Ok(())
}

/// True when `getcap` lists `cap_net_raw` on `path`.
pub fn has_raw_socket(exec: &dyn Executor, path: &Path) -> Result<bool> {
    let output = exec.run_checked(
        &Invocation::query("getcap").arg(path.display().to_string()),
    )?;
    Ok(output.stdout.contains("cap_net_raw"))
}
