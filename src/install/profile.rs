//! Environment block shared by the system profile, user profiles and
//! virtualenv activation scripts.

use crate::common::{Layout, Result, SetupError};
use std::fs;
use std::path::Path;

pub const BEGIN_MARKER: &str = "# >>> mvs-setup >>>";
pub const END_MARKER: &str = "# <<< mvs-setup <<<";

/// Render the marked block of `export` lines for the SDK at `layout`.
pub fn render_block(layout: &Layout) -> String {
    let sdk = layout.sdk_root().display();
    let runenv = layout.runenv_dir();
    let lib = layout.lib_dir();
    let mvimport = layout.mvimport_dir();

    format!(
        "{begin}\n\
         export MVCAM_SDK_PATH={sdk}\n\
         export MVCAM_COMMON_RUNENV={runenv}\n\
         export LD_LIBRARY_PATH={lib}${{LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}}\n\
         export PYTHONPATH={mvimport}${{PYTHONPATH:+:$PYTHONPATH}}\n\
         {end}\n",
        begin = BEGIN_MARKER,
        end = END_MARKER,
        sdk = sdk,
        runenv = runenv.display(),
        lib = lib.display(),
        mvimport = mvimport.display(),
    )
}

/// Content of the system-wide `profile.d` script.
pub fn render_profile_script(layout: &Layout) -> String {
    format!(
        "# MVS camera SDK environment, generated {}\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        render_block(layout)
    )
}

/// Replace the marked block in `contents`, or append it.
///
/// Everything outside the markers is preserved byte for byte. Only the first
/// block is replaced; stray duplicates left by hand edits are removed.
/// Returns `None` when a begin marker has no end marker before the next begin
/// marker (or the end of the file), since the block's extent is then unknown.
pub fn upsert_block(contents: &str, block: &str) -> Option<String> {
    let mut out = String::with_capacity(contents.len() + block.len() + 1);
    let mut rest = contents;
    let mut replaced = false;

    while let Some(start) = rest.find(BEGIN_MARKER) {
        let body = &rest[start + BEGIN_MARKER.len()..];
        let end_rel = body.find(END_MARKER)?;
        if body[..end_rel].contains(BEGIN_MARKER) {
            return None;
        }
        let mut end = start + BEGIN_MARKER.len() + end_rel + END_MARKER.len();
        if rest[end..].starts_with('\n') {
            end += 1;
        }

        out.push_str(&rest[..start]);
        if !replaced {
            out.push_str(block);
            replaced = true;
        }
        rest = &rest[end..];
    }
    out.push_str(rest);

    if !replaced {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        out.push_str(block);
    }
    Some(out)
}

/// Upsert `block` into the file at `path`. Returns true if the file was created.
pub fn upsert_file(path: &Path, block: &str) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let created = existing.is_none();
    let current = existing.unwrap_or_default();
    let updated = upsert_block(&current, block)
        .ok_or_else(|| SetupError::UnbalancedMarkers(path.to_path_buf()))?;

    if updated != current {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, updated)?;
        tracing::debug!("Updated environment block in {}", path.display());
    } else {
        tracing::debug!("Environment block in {} already current", path.display());
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Config;

    fn block() -> String {
        render_block(&Layout::system(&Config::default()))
    }

    #[test]
    fn block_exports_sdk_variables() {
        let block = block();
        assert!(block.starts_with(BEGIN_MARKER));
        assert!(block.ends_with(&format!("{}\n", END_MARKER)));
        assert!(block.contains("export MVCAM_SDK_PATH=/opt/MVS\n"));
        assert!(block.contains("export MVCAM_COMMON_RUNENV=/opt/MVS/lib\n"));
        assert!(block.contains(
            "export LD_LIBRARY_PATH=/opt/MVS/lib/aarch64${LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}\n"
        ));
        assert!(block.contains("export PYTHONPATH=/opt/MVS/Samples/64/Python/MvImport"));
    }

    #[test]
    fn staged_layout_still_renders_system_paths() {
        let layout = Layout::new("/tmp/stage", &Config::default());
        assert!(!render_block(&layout).contains("/tmp/stage"));
    }

    #[test]
    fn appends_after_blank_line() {
        let out = upsert_block("alias ll='ls -l'", &block()).unwrap();
        assert!(out.starts_with("alias ll='ls -l'\n\n# >>> mvs-setup >>>"));
    }

    #[test]
    fn empty_file_gets_only_the_block() {
        assert_eq!(upsert_block("", &block()).unwrap(), block());
    }

    #[test]
    fn second_upsert_is_a_no_op() {
        let once = upsert_block("export EDITOR=vim\n", &block()).unwrap();
        let twice = upsert_block(&once, &block()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.matches(BEGIN_MARKER).count(), 1);
    }

    #[test]
    fn replaces_stale_block_and_keeps_surroundings() {
        let stale = format!(
            "before\n{}\nexport MVCAM_SDK_PATH=/old\n{}\nafter\n",
            BEGIN_MARKER, END_MARKER
        );
        let out = upsert_block(&stale, &block()).unwrap();
        assert!(out.starts_with("before\n"));
        assert!(out.ends_with("after\n"));
        assert!(!out.contains("/old"));
        assert_eq!(out.matches(BEGIN_MARKER).count(), 1);
    }

    #[test]
    fn collapses_duplicate_blocks() {
        let dup = format!("{b}x\n{b}", b = block());
        let out = upsert_block(&dup, &block()).unwrap();
        assert_eq!(out.matches(BEGIN_MARKER).count(), 1);
        assert!(out.contains("x\n"));
    }

    #[test]
    fn upsert_file_reports_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("home/pi/.bashrc");
        assert!(upsert_file(&path, &block()).unwrap());
        assert!(!upsert_file(&path, &block()).unwrap());
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches(BEGIN_MARKER).count(), 1);
    }

    #[test]
    fn begin_marker_without_end_is_refused() {
        let orphan = format!("{}\nexport MY_TOOL=1\nalias ll='ls -l'\n", BEGIN_MARKER);
        assert!(upsert_block(&orphan, &block()).is_none());

        // An orphan ahead of a complete block must not swallow the lines between them.
        let mixed = format!("{}\nexport MY_TOOL=1\n{}", BEGIN_MARKER, block());
        assert!(upsert_block(&mixed, &block()).is_none());
    }

    #[test]
    fn unbalanced_file_is_left_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".bashrc");
        let orphan = format!("{}\nexport MY_TOOL=1\nalias ll='ls -l'\n", BEGIN_MARKER);
        fs::write(&path, &orphan).unwrap();

        for _ in 0..2 {
            match upsert_file(&path, &block()) {
                Err(SetupError::UnbalancedMarkers(p)) => assert_eq!(p, path),
                other => panic!("expected UnbalancedMarkers, got {:?}", other),
            }
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), orphan);
    }
}
