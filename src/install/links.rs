use crate::common::{Layout, Result, SetupError};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created { link: PathBuf, target: PathBuf },
    AlreadyLinked(PathBuf),
    /// Both naming conventions already resolve to directories
    BothPresent,
    /// Neither exists, nothing to link against
    NoSamples,
}

enum Entry {
    Missing,
    Dir,
    Symlink(PathBuf),
    Other,
}

fn inspect(path: &Path) -> Result<Entry> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(Entry::Symlink(fs::read_link(path)?)),
        Ok(meta) if meta.is_dir() => Ok(Entry::Dir),
        Ok(_) => Ok(Entry::Other),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entry::Missing),
        Err(e) => Err(e.into()),
    }
}

/// Link `Samples/64` and `Samples/<arch>` so either naming convention works.
///
/// The link target is the sibling directory name, so the link stays valid
/// inside a staging root. Re-running with the link in place is a no-op.
pub fn link_samples(layout: &Layout) -> Result<LinkOutcome> {
    let [sixty_four, arch] = layout.samples_dirs();
    if sixty_four == arch {
        return Ok(LinkOutcome::BothPresent);
    }

    let a = layout.resolve(&sixty_four);
    let b = layout.resolve(&arch);

    match (inspect(&a)?, inspect(&b)?) {
        (Entry::Dir, Entry::Dir) => Ok(LinkOutcome::BothPresent),
        (Entry::Dir, other) => ensure_link(&b, other, &a),
        (other, Entry::Dir) => ensure_link(&a, other, &b),
        (Entry::Missing, Entry::Missing) => Ok(LinkOutcome::NoSamples),
        (Entry::Other, _) => Err(SetupError::LinkBlocked(a)),
        (_, Entry::Other) => Err(SetupError::LinkBlocked(b)),
        // A link that resolves elsewhere still gives us a directory to point at.
        (Entry::Symlink(_), Entry::Missing) if a.is_dir() => {
            ensure_link(&b, Entry::Missing, &a)
        }
        (Entry::Missing, Entry::Symlink(_)) if b.is_dir() => {
            ensure_link(&a, Entry::Missing, &b)
        }
        (Entry::Symlink(_), Entry::Symlink(_)) if a.is_dir() && b.is_dir() => {
            Ok(LinkOutcome::BothPresent)
        }
        (Entry::Symlink(_), _) if !a.is_dir() => Err(SetupError::DanglingLink(a)),
        // Only a dangling `b` is left.
        _ => Err(SetupError::DanglingLink(b)),
    }
}

fn ensure_link(link: &Path, current: Entry, target_dir: &Path) -> Result<LinkOutcome> {
    let target = target_dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| target_dir.to_path_buf());

    match current {
        Entry::Symlink(existing) if existing == target || existing == target_dir => {
            tracing::debug!("{} already links to {}", link.display(), existing.display());
            return Ok(LinkOutcome::AlreadyLinked(link.to_path_buf()));
        }
        Entry::Symlink(existing) => {
            tracing::warn!(
                "Replacing stale link {} -> {}",
                link.display(),
                existing.display()
            );
            fs::remove_file(link)?;
        }
        Entry::Missing => {}
        Entry::Dir | Entry::Other => return Err(SetupError::LinkBlocked(link.to_path_buf())),
    }

    symlink(&target, link)?;
    Ok(LinkOutcome::Created {
        link: link.to_path_buf(),
        target,
    })
}
