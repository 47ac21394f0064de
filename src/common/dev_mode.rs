use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;

/// Local staging tree used instead of `/` when running with `--dev`.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            let dev = Self { enabled, base_dir };
            for dir in ["etc/profile.d", "etc/ld.so.conf.d", "etc/udev/rules.d", "home"] {
                fs::create_dir_all(dev.root_dir().join(dir))?;
            }

            println!("📁 Development mode enabled - staging into: {}",
                     dev.root_dir().display());
            return Ok(dev);
        }

        Ok(Self { enabled, base_dir: PathBuf::new() })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Filesystem root for the install. `/` unless dev mode is on.
    pub fn root_dir(&self) -> PathBuf {
        if self.enabled {
            self.base_dir.join("root")
        } else {
            PathBuf::from("/")
        }
    }
}
