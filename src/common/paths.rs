use std::path::{Component, Path, PathBuf};
use crate::common::config::Config;

pub const LIBRARY_NAME: &str = "libMvCameraControl.so";
pub const BINDING_NAME: &str = "MvCameraControl_class.py";

/// Samples directory name used by the x86/arm64 "64" layout
pub const SAMPLES_64: &str = "64";

/// Maps the system paths the installer touches onto a filesystem root.
///
/// In production the root is `/` and paths are returned unchanged. In dev
/// mode, or with `--root`, every absolute path is re-rooted under a staging
/// directory so the whole sequence can run without touching the host.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    sdk_root: PathBuf,
    arch: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            sdk_root: config.sdk.install_root.clone(),
            arch: config.sdk.arch.clone(),
        }
    }

    pub fn system(config: &Config) -> Self {
        Self::new("/", config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_staged(&self) -> bool {
        self.root != Path::new("/")
    }

    /// Re-root an absolute system path. Relative paths are joined as-is.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let relative: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }

    // System paths as seen by the running board (never staged). These are the
    // values written into profile scripts and rule files.

    pub fn sdk_root(&self) -> &Path {
        &self.sdk_root
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn runenv_dir(&self) -> PathBuf {
        self.sdk_root.join("lib")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.sdk_root.join("lib").join(&self.arch)
    }

    pub fn library_file(&self) -> PathBuf {
        self.lib_dir().join(LIBRARY_NAME)
    }

    /// `Samples/64` and `Samples/<arch>`, in that order.
    pub fn samples_dirs(&self) -> [PathBuf; 2] {
        let samples = self.sdk_root.join("Samples");
        [samples.join(SAMPLES_64), samples.join(&self.arch)]
    }

    pub fn mvimport_dir(&self) -> PathBuf {
        self.samples_dirs()[0].join("Python").join("MvImport")
    }

    pub fn binding_candidates(&self) -> Vec<PathBuf> {
        self.samples_dirs()
            .iter()
            .map(|dir| dir.join("Python").join("MvImport").join(BINDING_NAME))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_layout_is_identity() {
        let layout = Layout::system(&Config::default());
        assert!(!layout.is_staged());
        assert_eq!(
            layout.resolve(Path::new("/etc/profile.d/mvs_sdk.sh")),
            PathBuf::from("/etc/profile.d/mvs_sdk.sh")
        );
    }

    #[test]
    fn staged_layout_reroots_absolute_paths() {
        let layout = Layout::new("/tmp/stage", &Config::default());
        assert!(layout.is_staged());
        assert_eq!(
            layout.resolve(&layout.library_file()),
            PathBuf::from("/tmp/stage/opt/MVS/lib/aarch64/libMvCameraControl.so")
        );
    }

    #[test]
    fn binding_candidates_cover_both_conventions() {
        let layout = Layout::system(&Config::default());
        let candidates = layout.binding_candidates();
        assert_eq!(
            candidates[0],
            PathBuf::from("/opt/MVS/Samples/64/Python/MvImport/MvCameraControl_class.py")
        );
        assert_eq!(
            candidates[1],
            PathBuf::from("/opt/MVS/Samples/aarch64/Python/MvImport/MvCameraControl_class.py")
        );
    }
}
