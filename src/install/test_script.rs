use crate::common::{Layout, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const TEMPLATE: &str = include_str!("../../assets/test_mvs_sdk.py");

pub fn render(layout: &Layout) -> String {
    TEMPLATE
        .replace("{{SDK_ROOT}}", &layout.sdk_root().display().to_string())
        .replace("{{LIB_DIR}}", &layout.lib_dir().display().to_string())
        .replace("{{MVIMPORT_DIR}}", &layout.mvimport_dir().display().to_string())
}

/// Write the smoke-test script to `path` with mode 0755.
pub fn write(layout: &Layout, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(layout))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Config;

    #[test]
    fn placeholders_are_filled() {
        let script = render(&Layout::system(&Config::default()));
        assert!(script.starts_with("#!/usr/bin/env python3"));
        assert!(!script.contains("{{"));
        assert!(script.contains("SDK_ROOT = \"/opt/MVS\""));
        assert!(script.contains("LIB_DIR = \"/opt/MVS/lib/aarch64\""));
        assert!(script.contains("MVIMPORT_DIR = \"/opt/MVS/Samples/64/Python/MvImport\""));
    }

    #[test]
    fn written_script_is_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("home/pi/test_mvs_sdk.py");
        write(&Layout::system(&Config::default()), &path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
