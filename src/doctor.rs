//! Post-install environment check (`mvs-setup check`).

use crate::cli::console;
use crate::common::paths::LIBRARY_NAME;
use crate::common::{Config, Layout};
use crate::install::capability;
use crate::system::{Executor, Invocation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const REQUIRED_VARS: [&str; 2] = ["MVCAM_SDK_PATH", "MVCAM_COMMON_RUNENV"];

/// Third-party wrapper around the SDK binding; optional.
pub const CAMERA_MODULE: &str = "hik_camera";

/// Opens a shared library, reporting why it could not be loaded.
pub type LibraryLoader = fn(&Path) -> std::result::Result<(), String>;

/// `dlopen` the library and drop it again.
///
/// Catches what a file check cannot: unresolved dependencies, a wrong ELF
/// architecture or a truncated download.
pub fn dlopen(path: &Path) -> std::result::Result<(), String> {
    // SAFETY: loading runs the library's ELF initialisers, the same as any
    // process linking the SDK would. No symbols are called.
    unsafe { libloading::Library::new(path) }
        .map(drop)
        .map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckItem {
    pub status: CheckStatus,
    pub item: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    fn push(&mut self, status: CheckStatus, item: &str, detail: impl Into<String>) {
        self.items.push(CheckItem { status, item: item.to_string(), detail: detail.into() });
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(CheckStatus::Fail) > 0
    }

    pub fn get(&self, item: &str) -> Option<&CheckItem> {
        self.items.iter().find(|i| i.item == item)
    }

    pub fn print(&self) {
        for item in &self.items {
            let line = if item.detail.is_empty() {
                item.item.clone()
            } else {
                format!("{}: {}", item.item, item.detail)
            };
            match item.status {
                CheckStatus::Pass => console::ok(&line),
                CheckStatus::Warn => console::warn(&line),
                CheckStatus::Fail => console::error(&line),
            }
        }

        console::rule();
        println!(
            "Check complete: {} passed, {} failed, {} warnings",
            self.count(CheckStatus::Pass),
            self.count(CheckStatus::Fail),
            self.count(CheckStatus::Warn)
        );
        if self.has_failures() {
            println!(
                "\n❌ Problems found, re-run `sudo mvs-setup install` or fix the items above"
            );
        } else {
            println!("\n✅ SDK environment looks good");
        }
    }
}

pub struct Doctor<'a> {
    config: Config,
    layout: Layout,
    exec: &'a dyn Executor,
    env: BTreeMap<String, String>,
    loader: LibraryLoader,
}

impl<'a> Doctor<'a> {
    /// `MVCAM_SDK_PATH` in `env` overrides the configured install root.
    pub fn new(
        config: &Config,
        root: PathBuf,
        exec: &'a dyn Executor,
        env: BTreeMap<String, String>,
    ) -> Self {
        let mut config = config.clone();
        if let Some(sdk) = env.get("MVCAM_SDK_PATH").filter(|s| !s.is_empty()) {
            config.sdk.install_root = PathBuf::from(sdk);
        }
        let layout = Layout::new(root, &config);
        Self { config, layout, exec, env, loader: dlopen }
    }

    pub fn with_loader(mut self, loader: LibraryLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn run(&self) -> CheckReport {
        let mut report = CheckReport::default();

        let sdk_present = self.check_sdk_path(&mut report);
        let library_present = self.check_library(&mut report, sdk_present);
        self.check_binding(&mut report, sdk_present);
        self.check_env_vars(&mut report);
        self.check_ld_library_path(&mut report);
        self.check_linker_cache(&mut report);

        let interpreters = self.interpreters();
        self.check_network_capability(&mut report, &interpreters);
        self.check_library_load(&mut report, library_present);
        self.check_camera_module(&mut report, &interpreters);
        self.check_udev_rule(&mut report);

        report
    }

    fn interpreters(&self) -> Vec<PathBuf> {
        let venv = self
            .config
            .python
            .venv
            .clone()
            .or_else(|| self.env.get("VIRTUAL_ENV").map(PathBuf::from));
        capability::resolve_interpreters(
            self.exec,
            &self.layout,
            &self.config.python.interpreters,
            venv.as_deref(),
        )
    }

    fn check_sdk_path(&self, report: &mut CheckReport) -> bool {
        let sdk = self.layout.sdk_root();
        if self.layout.resolve(sdk).is_dir() {
            report.push(CheckStatus::Pass, "SDK path", sdk.display().to_string());
            true
        } else {
            let detail = format!("{} does not exist", sdk.display());
            report.push(CheckStatus::Fail, "SDK path", detail);
            false
        }
    }

    fn check_library(&self, report: &mut CheckReport, sdk_present: bool) -> bool {
        if !sdk_present {
            report.push(CheckStatus::Fail, "SDK library", "SDK path missing");
            return false;
        }
        let library = self.layout.library_file();
        if self.layout.resolve(&library).is_file() {
            report.push(CheckStatus::Pass, "SDK library", LIBRARY_NAME);
            true
        } else {
            let detail = format!("{} does not exist", library.display());
            report.push(CheckStatus::Fail, "SDK library", detail);
            false
        }
    }

    fn check_binding(&self, report: &mut CheckReport, sdk_present: bool) {
        if !sdk_present {
            report.push(CheckStatus::Fail, "Python binding", "SDK path missing");
            return;
        }
        let found = self.layout.binding_candidates().into_iter().find(|path| {
            let staged = self.layout.resolve(path);
            staged.is_file() || fs::symlink_metadata(&staged).is_ok()
        });
        match found {
            Some(path) => {
                report.push(CheckStatus::Pass, "Python binding", path.display().to_string())
            }
            None => report.push(
                CheckStatus::Fail,
                "Python binding",
                "MvCameraControl_class.py not found",
            ),
        }
    }

    fn check_env_vars(&self, report: &mut CheckReport) {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|var| self.env.get(*var).map(|v| v.is_empty()).unwrap_or(true))
            .collect();

        if missing.is_empty() {
            report.push(CheckStatus::Pass, "Environment variables", REQUIRED_VARS.join(", "));
        } else {
            report.push(
                CheckStatus::Fail,
                "Environment variables",
                format!("missing {} (open a new login shell?)", missing.join(", ")),
            );
        }
    }

    fn check_ld_library_path(&self, report: &mut CheckReport) {
        let lib_dir = self.layout.lib_dir();
        let present = self
            .env
            .get("LD_LIBRARY_PATH")
            .map(|value| value.split(':').any(|entry| PathBuf::from(entry) == lib_dir))
            .unwrap_or(false);

        if present {
            let detail = format!("contains {}", lib_dir.display());
            report.push(CheckStatus::Pass, "LD_LIBRARY_PATH", detail);
        } else {
            let detail = format!("does not contain {}", lib_dir.display());
            report.push(CheckStatus::Warn, "LD_LIBRARY_PATH", detail);
        }
    }

    fn check_linker_cache(&self, report: &mut CheckReport) {
        match self.exec.run_checked(&Invocation::query("ldconfig").arg("-p")) {
            Ok(output) if output.stdout.contains(LIBRARY_NAME) => {
                let detail = format!("{} registered", LIBRARY_NAME);
                report.push(CheckStatus::Pass, "Linker cache", detail);
            }
            Ok(_) => {
                let detail = format!("{} not in ldconfig cache", LIBRARY_NAME);
                report.push(CheckStatus::Warn, "Linker cache", detail);
            }
            Err(e) => {
                report.push(CheckStatus::Warn, "Linker cache", format!("cannot check: {}", e))
            }
        }
    }

    fn check_network_capability(&self, report: &mut CheckReport, interpreters: &[PathBuf]) {
        if interpreters.is_empty() {
            report.push(CheckStatus::Warn, "Network capability", "no Python interpreter found");
            return;
        }

        let mut missing = Vec::new();
        for interpreter in interpreters {
            match capability::has_raw_socket(self.exec, interpreter) {
                Ok(true) => {}
                Ok(false) => missing.push(interpreter.display().to_string()),
                Err(e) => {
                    let detail = format!("cannot check: {}", e);
                    report.push(CheckStatus::Warn, "Network capability", detail);
                    return;
                }
            }
        }

        if missing.is_empty() {
            report.push(CheckStatus::Pass, "Network capability", "cap_net_raw set");
        } else {
            report.push(
                CheckStatus::Warn,
                "Network capability",
                format!(
                    "cap_net_raw missing on {}, GigE cameras may need sudo",
                    missing.join(", ")
                ),
            );
        }
    }

    fn check_library_load(&self, report: &mut CheckReport, library_present: bool) {
        if !library_present {
            report.push(CheckStatus::Fail, "Library load", "library missing");
            return;
        }
        let library = self.layout.resolve(&self.layout.library_file());
        match (self.loader)(&library) {
            Ok(()) => {
                let detail = format!("{} loads", LIBRARY_NAME);
                report.push(CheckStatus::Pass, "Library load", detail);
            }
            Err(e) => report.push(CheckStatus::Fail, "Library load", e),
        }
    }

    fn check_camera_module(&self, report: &mut CheckReport, interpreters: &[PathBuf]) {
        let Some(python) = interpreters.first() else {
            report.push(CheckStatus::Warn, "Camera module", "no Python interpreter found");
            return;
        };

        let import = Invocation::query(&python.display().to_string())
            .arg("-c")
            .arg(format!("import {}", CAMERA_MODULE));
        match self.exec.run(&import) {
            Ok(output) if output.success() => {
                let detail = format!("{} importable", CAMERA_MODULE);
                report.push(CheckStatus::Pass, "Camera module", detail);
            }
            Ok(_) => {
                let detail = format!("{} not installed (optional)", CAMERA_MODULE);
                report.push(CheckStatus::Warn, "Camera module", detail);
            }
            Err(e) => {
                report.push(CheckStatus::Warn, "Camera module", format!("cannot check: {}", e))
            }
        }
    }

    fn check_udev_rule(&self, report: &mut CheckReport) {
        let rules = &self.config.udev.rules_file;
        if self.layout.resolve(rules).is_file() {
            report.push(CheckStatus::Pass, "udev rule", rules.display().to_string());
        } else {
            let detail = format!("{} missing, USB cameras may need sudo", rules.display());
            report.push(CheckStatus::Warn, "udev rule", detail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Result;
    use crate::system::CommandOutput;

    struct FakeHost {
        ldconfig: &'static str,
        getcap: &'static str,
        python: Option<PathBuf>,
        import_status: i32,
    }

    impl FakeHost {
        fn empty() -> Self {
            Self { ldconfig: "", getcap: "", python: None, import_status: 0 }
        }
    }

    impl Executor for FakeHost {
        fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            match invocation.program.as_str() {
                "ldconfig" => Ok(CommandOutput::with_stdout(self.ldconfig)),
                "getcap" => Ok(CommandOutput::with_stdout(self.getcap)),
                _ if invocation.args.first().map(String::as_str) == Some("-c") => {
                    Ok(CommandOutput { status: Some(self.import_status), ..Default::default() })
                }
                _ => Ok(CommandOutput::ok()),
            }
        }

        fn which(&self, _program: &str) -> Option<PathBuf> {
            self.python.clone()
        }
    }

    fn loads(_: &Path) -> std::result::Result<(), String> {
        Ok(())
    }

    fn wrong_elf_class(_: &Path) -> std::result::Result<(), String> {
        Err("wrong ELF class: ELFCLASS32".to_string())
    }

    fn install_sdk(root: &Path) {
        let lib = root.join("opt/MVS/lib/aarch64");
        let binding = root.join("opt/MVS/Samples/64/Python/MvImport");
        fs::create_dir_all(&lib).unwrap();
        fs::create_dir_all(&binding).unwrap();
        fs::write(lib.join(LIBRARY_NAME), b"\x7fELF").unwrap();
        fs::write(binding.join("MvCameraControl_class.py"), "").unwrap();
        fs::create_dir_all(root.join("etc/udev/rules.d")).unwrap();
        fs::write(root.join("etc/udev/rules.d/99-mvs-camera.rules"), "").unwrap();
        fs::create_dir_all(root.join("usr/bin")).unwrap();
        fs::write(root.join("usr/bin/python3.11"), "").unwrap();
    }

    fn healthy_host(root: &Path) -> FakeHost {
        FakeHost {
            ldconfig: "\tlibMvCameraControl.so (libc6,AArch64) => \
                       /opt/MVS/lib/aarch64/libMvCameraControl.so\n",
            getcap: "/usr/bin/python3.11 cap_net_admin,cap_net_raw=eip\n",
            python: Some(root.join("usr/bin/python3.11")),
            import_status: 0,
        }
    }

    fn good_env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("MVCAM_SDK_PATH".to_string(), "/opt/MVS".to_string()),
            ("MVCAM_COMMON_RUNENV".to_string(), "/opt/MVS/lib".to_string()),
            ("LD_LIBRARY_PATH".to_string(), "/usr/local/lib:/opt/MVS/lib/aarch64".to_string()),
        ])
    }

    fn doctor<'a>(root: &Path, exec: &'a FakeHost, env: BTreeMap<String, String>) -> Doctor<'a> {
        Doctor::new(&Config::default(), root.to_path_buf(), exec, env)
    }

    #[test]
    fn healthy_install_passes() {
        let tmp = tempfile::tempdir().unwrap();
        install_sdk(tmp.path());
        let exec = healthy_host(tmp.path());

        let report = doctor(tmp.path(), &exec, good_env()).with_loader(loads).run();
        assert_eq!(report.items.len(), 10);
        assert_eq!(report.count(CheckStatus::Pass), 10, "{:?}", report.items);
        assert!(!report.has_failures());
    }

    #[test]
    fn empty_system_fails_core_items() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = FakeHost::empty();

        let report = doctor(tmp.path(), &exec, BTreeMap::new()).with_loader(loads).run();
        assert!(report.has_failures());
        assert_eq!(report.get("SDK path").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("SDK library").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("Python binding").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("Environment variables").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("Library load").unwrap().status, CheckStatus::Fail);
        assert_eq!(report.get("LD_LIBRARY_PATH").unwrap().status, CheckStatus::Warn);
        assert_eq!(report.get("Network capability").unwrap().status, CheckStatus::Warn);
        assert_eq!(report.get("Camera module").unwrap().status, CheckStatus::Warn);
        assert_eq!(report.get("udev rule").unwrap().status, CheckStatus::Warn);
    }

    #[test]
    fn unloadable_library_fails() {
        let tmp = tempfile::tempdir().unwrap();
        install_sdk(tmp.path());
        let exec = healthy_host(tmp.path());

        let report = doctor(tmp.path(), &exec, good_env()).with_loader(wrong_elf_class).run();
        let item = report.get("Library load").unwrap();
        assert_eq!(item.status, CheckStatus::Fail);
        assert!(item.detail.contains("ELFCLASS32"));
        assert_eq!(report.get("SDK library").unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn dlopen_rejects_a_file_that_is_not_a_library() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join(LIBRARY_NAME);
        fs::write(&bogus, b"\x7fELF truncated").unwrap();

        assert!(dlopen(&bogus).is_err());
        assert!(dlopen(&tmp.path().join("libmissing.so")).is_err());
    }

    #[test]
    fn missing_camera_module_only_warns() {
        let tmp = tempfile::tempdir().unwrap();
        install_sdk(tmp.path());
        let mut exec = healthy_host(tmp.path());
        exec.import_status = 1;

        let report = doctor(tmp.path(), &exec, good_env()).with_loader(loads).run();
        let item = report.get("Camera module").unwrap();
        assert_eq!(item.status, CheckStatus::Warn);
        assert!(item.detail.contains("optional"));
        assert!(!report.has_failures());
    }

    #[test]
    fn binding_under_arch_directory_counts() {
        let tmp = tempfile::tempdir().unwrap();
        install_sdk(tmp.path());
        let samples = tmp.path().join("opt/MVS/Samples");
        fs::rename(samples.join("64"), samples.join("aarch64")).unwrap();
        let exec = FakeHost::empty();

        let report = doctor(tmp.path(), &exec, good_env()).with_loader(loads).run();
        assert_eq!(report.get("Python binding").unwrap().status, CheckStatus::Pass);
        assert_eq!(report.get("Linker cache").unwrap().status, CheckStatus::Warn);
    }

    #[test]
    fn env_sdk_path_overrides_config() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = FakeHost::empty();
        let mut env = good_env();
        env.insert("MVCAM_SDK_PATH".into(), "/srv/mvs".into());
        fs::create_dir_all(tmp.path().join("srv/mvs")).unwrap();

        let report = doctor(tmp.path(), &exec, env).run();
        assert_eq!(report.get("SDK path").unwrap().detail, "/srv/mvs");
    }

    #[test]
    fn report_serialises_lowercase_status() {
        let mut report = CheckReport::default();
        report.push(CheckStatus::Warn, "udev rule", "missing");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"warn\""));
    }
}
