pub mod capability;
pub mod links;
pub mod package;
pub mod profile;
pub mod test_script;
pub mod udev;

use crate::cli::console;
use crate::common::{Config, Layout, Result, SetupError};
use crate::system::{self, Executor, Invocation, TargetUser};
use clap::ValueEnum;
use std::fs;
use std::path::{Path, PathBuf};

/// The install sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Step {
    CheckRoot,
    CheckArch,
    LocatePackage,
    RejectRuntime,
    InstallDependencies,
    InstallPackage,
    VerifyInstall,
    LinkSamples,
    SystemEnvironment,
    UserEnvironment,
    RawSocketCapability,
    UdevRules,
    TestScript,
}

impl Step {
    pub const ALL: [Step; 13] = [
        Step::CheckRoot,
        Step::CheckArch,
        Step::LocatePackage,
        Step::RejectRuntime,
        Step::InstallDependencies,
        Step::InstallPackage,
        Step::VerifyInstall,
        Step::LinkSamples,
        Step::SystemEnvironment,
        Step::UserEnvironment,
        Step::RawSocketCapability,
        Step::UdevRules,
        Step::TestScript,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::CheckRoot => "check-root",
            Step::CheckArch => "check-arch",
            Step::LocatePackage => "locate-package",
            Step::RejectRuntime => "reject-runtime",
            Step::InstallDependencies => "install-dependencies",
            Step::InstallPackage => "install-package",
            Step::VerifyInstall => "verify-install",
            Step::LinkSamples => "link-samples",
            Step::SystemEnvironment => "system-environment",
            Step::UserEnvironment => "user-environment",
            Step::RawSocketCapability => "raw-socket-capability",
            Step::UdevRules => "udev-rules",
            Step::TestScript => "test-script",
        }
    }

    /// Preconditions always run, whatever `--skip` says.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Step::CheckRoot | Step::CheckArch | Step::LocatePackage | Step::RejectRuntime
        )
    }

    fn position(&self) -> usize {
        Step::ALL.iter().position(|s| s == self).unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Package given on the command line
    pub package: Option<PathBuf>,
    /// Where to look for a package when none is given
    pub search_dir: PathBuf,
    pub venv: Option<PathBuf>,
    pub user: Option<String>,
    pub skip: Vec<Step>,
    pub euid: u32,
}

#[derive(Debug, Clone, Default)]
pub struct InstallSummary {
    pub package: PathBuf,
    pub completed: Vec<Step>,
    pub skipped: Vec<Step>,
    pub interpreters: Vec<PathBuf>,
    pub test_script: Option<PathBuf>,
}

pub struct Installer<'a> {
    config: &'a Config,
    layout: Layout,
    exec: &'a dyn Executor,
    options: InstallOptions,
}

impl<'a> Installer<'a> {
    pub fn new(
        config: &'a Config,
        layout: Layout,
        exec: &'a dyn Executor,
        options: InstallOptions,
    ) -> Self {
        Self { config, layout, exec, options }
    }

    fn wants(&self, step: Step) -> bool {
        step.is_precondition() || !self.options.skip.contains(&step)
    }

    /// Announce `step`, or record it as skipped. Returns whether to run it.
    fn begin(&self, step: Step, summary: &mut InstallSummary) -> bool {
        if !self.wants(step) {
            console::info(&format!(
                "({}/{}) {} skipped",
                step.position(),
                Step::ALL.len(),
                step.name()
            ));
            summary.skipped.push(step);
            return false;
        }
        console::info(&format!("({}/{}) {}", step.position(), Step::ALL.len(), step.name()));
        tracing::debug!("Starting step {}", step.name());
        true
    }

    fn venv(&self) -> Option<PathBuf> {
        self.options.venv.clone().or_else(|| self.config.python.venv.clone())
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&self) -> Result<InstallSummary> {
        let mut summary = InstallSummary::default();

        if self.begin(Step::CheckRoot, &mut summary) {
            self.check_root()?;
            summary.completed.push(Step::CheckRoot);
        }

        if self.begin(Step::CheckArch, &mut summary) {
            self.check_arch()?;
            summary.completed.push(Step::CheckArch);
        }

        self.begin(Step::LocatePackage, &mut summary);
        let package = package::locate(
            self.options.package.as_deref(),
            &self.options.search_dir,
            &self.config.sdk.package_prefix,
        )?;
        console::ok(&format!("Using package {}", package.display()));
        summary.package = package.clone();
        summary.completed.push(Step::LocatePackage);

        self.begin(Step::RejectRuntime, &mut summary);
        package::ensure_full_sdk(&package, &self.config.sdk.runtime_marker)?;
        summary.completed.push(Step::RejectRuntime);

        if self.begin(Step::InstallDependencies, &mut summary) {
            self.install_dependencies()?;
            summary.completed.push(Step::InstallDependencies);
        }

        if self.begin(Step::InstallPackage, &mut summary) {
            self.install_package(&package)?;
            summary.completed.push(Step::InstallPackage);
        }

        if self.begin(Step::VerifyInstall, &mut summary) {
            self.verify_install()?;
            summary.completed.push(Step::VerifyInstall);
        }

        if self.begin(Step::LinkSamples, &mut summary) {
            match links::link_samples(&self.layout)? {
                links::LinkOutcome::Created { link, target } => {
                    console::ok(&format!("Linked {} -> {}", link.display(), target.display()))
                }
                links::LinkOutcome::AlreadyLinked(link) => {
                    console::ok(&format!("{} already linked", link.display()))
                }
                links::LinkOutcome::BothPresent => console::ok("Both sample layouts present"),
                links::LinkOutcome::NoSamples => console::warn("No Samples directory to link"),
            }
            summary.completed.push(Step::LinkSamples);
        }

        if self.begin(Step::SystemEnvironment, &mut summary) {
            self.system_environment()?;
            summary.completed.push(Step::SystemEnvironment);
        }

        let user = if self.wants(Step::UserEnvironment) || self.wants(Step::TestScript) {
            let user = TargetUser::resolve(&self.layout, self.options.user.as_deref())?;
            tracing::debug!("Per-user files go to {} ({})", user.name, user.home.display());
            Some(user)
        } else {
            None
        };

        if self.begin(Step::UserEnvironment, &mut summary) {
            if let Some(user) = &user {
                self.user_environment(user)?;
            }
            summary.completed.push(Step::UserEnvironment);
        }

        if self.begin(Step::RawSocketCapability, &mut summary) {
            let venv = self.venv();
            summary.interpreters = capability::resolve_interpreters(
                self.exec,
                &self.layout,
                &self.config.python.interpreters,
                venv.as_deref(),
            );
            capability::grant_raw_socket(self.exec, &summary.interpreters)?;
            summary.completed.push(Step::RawSocketCapability);
        }

        if self.begin(Step::UdevRules, &mut summary) {
            self.udev_rules()?;
            summary.completed.push(Step::UdevRules);
        }

        if self.begin(Step::TestScript, &mut summary) {
            if let Some(user) = &user {
                let script = user.home.join(&self.config.test_script.file_name);
                let target = self.layout.resolve(&script);
                test_script::write(&self.layout, &target)?;
                self.hand_over(&target, user)?;
                console::ok(&format!("Test script written to {}", script.display()));
                summary.test_script = Some(script);
            }
            summary.completed.push(Step::TestScript);
        }

        Ok(summary)
    }

    fn check_root(&self) -> Result<()> {
        if self.layout.is_staged() {
            tracing::debug!(
                "Staged install into {}, root not required",
                self.layout.root().display()
            );
            return Ok(());
        }
        if self.options.euid != 0 {
            return Err(SetupError::NotRoot);
        }
        Ok(())
    }

    fn check_arch(&self) -> Result<()> {
        let found = system::machine(self.exec)?;
        if found != self.config.sdk.arch {
            return Err(SetupError::UnsupportedArch {
                expected: self.config.sdk.arch.clone(),
                found,
            });
        }
        console::ok(&format!("Architecture {}", found));
        Ok(())
    }

    fn install_dependencies(&self) -> Result<()> {
        let deps = &self.config.packages.dependencies;
        if deps.is_empty() {
            tracing::debug!("No dependencies configured");
            return Ok(());
        }
        self.exec.run_checked(
            &Invocation::new("apt-get")
                .args(["install", "-y"])
                .args(deps.iter().cloned()),
        )?;
        Ok(())
    }

    fn install_package(&self, package: &Path) -> Result<()> {
        let invocation = if self.layout.is_staged() {
            // Only writes into the staging root
            Invocation::query("dpkg-deb")
                .arg("-x")
                .arg(package.display().to_string())
                .arg(self.layout.root().display().to_string())
        } else {
            Invocation::new("dpkg").arg("-i").arg(package.display().to_string())
        };
        self.exec.run_checked(&invocation)?;
        Ok(())
    }

    fn verify_install(&self) -> Result<()> {
        let library = self.layout.resolve(&self.layout.library_file());
        if !library.is_file() {
            return Err(SetupError::MissingInstalledFile(library));
        }
        console::ok(&format!("Found {}", self.layout.library_file().display()));

        let candidates = self.layout.binding_candidates();
        let binding = candidates
            .iter()
            .find(|path| {
                let staged = self.layout.resolve(path);
                staged.is_file() || fs::symlink_metadata(&staged).is_ok()
            })
            .ok_or_else(|| SetupError::MissingInstalledFile(self.layout.resolve(&candidates[0])))?;
        console::ok(&format!("Found {}", binding.display()));
        Ok(())
    }

    fn system_environment(&self) -> Result<()> {
        let script = self.layout.resolve(&self.config.environment.profile_script);
        write_file(&script, &profile::render_profile_script(&self.layout))?;
        console::ok(&format!("Wrote {}", self.config.environment.profile_script.display()));

        let ld_conf = self.layout.resolve(&self.config.environment.ld_conf);
        write_file(&ld_conf, &format!("{}\n", self.layout.lib_dir().display()))?;
        console::ok(&format!("Wrote {}", self.config.environment.ld_conf.display()));

        self.exec.run_checked(&Invocation::new("ldconfig"))?;
        Ok(())
    }

    fn user_environment(&self, user: &TargetUser) -> Result<()> {
        let block = profile::render_block(&self.layout);

        let rc = user.home.join(&self.config.environment.user_profile);
        let rc_target = self.layout.resolve(&rc);
        if profile::upsert_file(&rc_target, &block)? {
            self.hand_over(&rc_target, user)?;
        }
        console::ok(&format!("Environment block in {}", rc.display()));

        if let Some(venv) = self.venv() {
            let activate = self.layout.resolve(&venv.join("bin").join("activate"));
            if !activate.is_file() {
                return Err(SetupError::MissingInstalledFile(activate));
            }
            profile::upsert_file(&activate, &block)?;
            console::ok(&format!("Environment block in {}", venv.join("bin/activate").display()));
        }
        Ok(())
    }

    fn udev_rules(&self) -> Result<()> {
        let rules = self.layout.resolve(&self.config.udev.rules_file);
        write_file(&rules, &udev::render_rules(&self.config.udev))?;
        console::ok(&format!("Wrote {}", self.config.udev.rules_file.display()));

        self.exec.run_checked(&Invocation::new("udevadm").args(["control", "--reload-rules"]))?;
        self.exec.run_checked(&Invocation::new("udevadm").arg("trigger"))?;
        Ok(())
    }

    /// Give a file we created in the user's home back to that user.
    fn hand_over(&self, path: &Path, user: &TargetUser) -> Result<()> {
        if self.layout.is_staged() || self.options.euid != 0 {
            return Ok(());
        }
        std::os::unix::fs::chown(path, Some(user.uid), Some(user.gid))?;
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
