use crate::common::{Result, SetupError};
use std::fs;
use std::path::{Path, PathBuf};

/// Use `explicit` if given, otherwise pick the newest-named `<prefix>*.deb` in `dir`.
pub fn locate(explicit: Option<&Path>, dir: &Path, prefix: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(SetupError::PackageNotFound(path.to_path_buf()));
        }
        return Ok(path.to_path_buf());
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with(prefix) && name.ends_with(".deb") && path.is_file() {
            candidates.push(path);
        }
    }

    candidates.sort();
    if candidates.len() > 1 {
        tracing::warn!(
            "Found {} SDK packages, using the newest: {}",
            candidates.len(),
            candidates.last().map(|p| p.display().to_string()).unwrap_or_default()
        );
    }

    candidates.pop().ok_or_else(|| SetupError::NoPackageFound {
        prefix: prefix.to_string(),
        dir: dir.to_path_buf(),
    })
}

pub fn is_runtime_variant(package: &Path, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    package
        .file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.to_lowercase().contains(&marker.to_lowercase()))
        .unwrap_or(false)
}

/// Reject the runtime-only distribution, which ships no Python bindings.
pub fn ensure_full_sdk(package: &Path, marker: &str) -> Result<()> {
    if is_runtime_variant(package, marker) {
        return Err(SetupError::RuntimePackage(package.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"!<arch>\n").unwrap();
        path
    }

    #[test]
    fn explicit_package_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("MvCamCtrlSDK_missing.deb");
        let err = locate(Some(&missing), tmp.path(), "MvCamCtrlSDK").unwrap_err();
        assert!(matches!(err, SetupError::PackageNotFound(_)));

        let present = touch(tmp.path(), "anything.deb");
        assert_eq!(locate(Some(&present), tmp.path(), "MvCamCtrlSDK").unwrap(), present);
    }

    #[test]
    fn search_picks_greatest_name() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "MvCamCtrlSDK_STD_V4.3.0_aarch64.deb");
        let newest = touch(tmp.path(), "MvCamCtrlSDK_STD_V4.4.1_aarch64.deb");
        touch(tmp.path(), "MvCamCtrlSDK_notes.txt");
        touch(tmp.path(), "other_V9.deb");

        assert_eq!(locate(None, tmp.path(), "MvCamCtrlSDK").unwrap(), newest);
    }

    #[test]
    fn search_with_no_match_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = locate(None, tmp.path(), "MvCamCtrlSDK").unwrap_err();
        assert!(matches!(err, SetupError::NoPackageFound { .. }));
    }

    #[test]
    fn runtime_variant_detection_ignores_case() {
        let marker = "Runtime";
        assert!(is_runtime_variant(
            Path::new("/tmp/MvCamCtrlSDK_Runtime-4.4.1_aarch64.deb"),
            marker
        ));
        assert!(is_runtime_variant(Path::new("MVCAMCTRLSDK_RUNTIME.deb"), marker));
        assert!(!is_runtime_variant(Path::new("/runtime/MvCamCtrlSDK_STD_V4.4.1.deb"), marker));
        assert!(ensure_full_sdk(Path::new("MvCamCtrlSDK_STD_V4.4.1.deb"), marker).is_ok());
        assert!(matches!(
            ensure_full_sdk(Path::new("MvCamCtrlSDK_Runtime.deb"), marker),
            Err(SetupError::RuntimePackage(_))
        ));
    }
}
