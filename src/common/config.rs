use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{Result, SetupError};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/mvs-setup/setup.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sdk: SdkConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub udev: UdevConfig,
    #[serde(default)]
    pub test_script: TestScriptConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SdkConfig {
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,
    #[serde(default = "default_runtime_marker")]
    pub runtime_marker: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            arch: default_arch(),
            package_prefix: default_package_prefix(),
            runtime_marker: default_runtime_marker(),
        }
    }
}

fn default_install_root() -> PathBuf { PathBuf::from("/opt/MVS") }
fn default_arch() -> String { "aarch64".to_string() }
fn default_package_prefix() -> String { "MvCamCtrlSDK".to_string() }
fn default_runtime_marker() -> String { "Runtime".to_string() }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PackagesConfig {
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self { dependencies: default_dependencies() }
    }
}

fn default_dependencies() -> Vec<String> {
    vec!["libusb-1.0-0".to_string(), "libcap2-bin".to_string()]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnvironmentConfig {
    #[serde(default = "default_profile_script")]
    pub profile_script: PathBuf,
    #[serde(default = "default_ld_conf")]
    pub ld_conf: PathBuf,
    /// Relative to the target user's home directory
    #[serde(default = "default_user_profile")]
    pub user_profile: PathBuf,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            profile_script: default_profile_script(),
            ld_conf: default_ld_conf(),
            user_profile: default_user_profile(),
        }
    }
}

fn default_profile_script() -> PathBuf { PathBuf::from("/etc/profile.d/mvs_sdk.sh") }
fn default_ld_conf() -> PathBuf { PathBuf::from("/etc/ld.so.conf.d/mvs_sdk.conf") }
fn default_user_profile() -> PathBuf { PathBuf::from(".bashrc") }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PythonConfig {
    #[serde(default = "default_interpreters")]
    pub interpreters: Vec<String>,
    #[serde(default)]
    pub venv: Option<PathBuf>,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self { interpreters: default_interpreters(), venv: None }
    }
}

fn default_interpreters() -> Vec<String> { vec!["python3".to_string()] }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UdevConfig {
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
    #[serde(default = "default_vendor_ids")]
    pub usb_vendor_ids: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for UdevConfig {
    fn default() -> Self {
        Self {
            rules_file: default_rules_file(),
            usb_vendor_ids: default_vendor_ids(),
            mode: default_mode(),
        }
    }
}

fn default_rules_file() -> PathBuf { PathBuf::from("/etc/udev/rules.d/99-mvs-camera.rules") }
fn default_vendor_ids() -> Vec<String> { vec!["2bdf".to_string()] }
fn default_mode() -> String { "0666".to_string() }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TestScriptConfig {
    #[serde(default = "default_test_script_name")]
    pub file_name: String,
}

impl Default for TestScriptConfig {
    fn default() -> Self {
        Self { file_name: default_test_script_name() }
    }
}

fn default_test_script_name() -> String { "test_mvs_sdk.py".to_string() }

impl Config {
    /// Load the config named on the command line, or the system config if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_path(path)
                } else {
                    tracing::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SetupError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| SetupError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sdk.install_root.is_absolute() {
            return Err(SetupError::Config(format!(
                "sdk.install_root must be absolute, got {}", self.sdk.install_root.display()
            )));
        }
        if self.sdk.arch.trim().is_empty() {
            return Err(SetupError::Config("sdk.arch must not be empty".into()));
        }
        if self.sdk.package_prefix.trim().is_empty() {
            return Err(SetupError::Config("sdk.package_prefix must not be empty".into()));
        }

        for (key, path) in [
            ("environment.profile_script", &self.environment.profile_script),
            ("environment.ld_conf", &self.environment.ld_conf),
            ("udev.rules_file", &self.udev.rules_file),
        ] {
            if !path.is_absolute() {
                return Err(SetupError::Config(format!(
                    "{} must be absolute, got {}", key, path.display()
                )));
            }
        }
        if self.environment.user_profile.is_absolute() {
            return Err(SetupError::Config(format!(
                "environment.user_profile must be relative to the home directory, got {}",
                self.environment.user_profile.display()
            )));
        }

        for id in &self.udev.usb_vendor_ids {
            if id.len() != 4 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(SetupError::Config(format!(
                    "udev.usb_vendor_ids entries must be 4 hex digits, got {:?}", id
                )));
            }
        }
        if u32::from_str_radix(&self.udev.mode, 8).is_err() {
            return Err(SetupError::Config(format!(
                "udev.mode must be an octal permission string, got {:?}", self.udev.mode
            )));
        }

        if self.test_script.file_name.contains('/') || self.test_script.file_name.is_empty() {
            return Err(SetupError::Config(format!(
                "test_script.file_name must be a plain file name, got {:?}",
                self.test_script.file_name
            )));
        }

        Ok(())
    }
}
