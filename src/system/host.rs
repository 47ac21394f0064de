use crate::common::{Layout, Result, SetupError};
use crate::system::exec::{Executor, Invocation};
use std::path::{Path, PathBuf};

pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

fn effective_gid() -> u32 {
    // SAFETY: as above.
    unsafe { libc::getegid() }
}

/// Kernel machine string, as `uname -m` reports it.
pub fn machine(exec: &dyn Executor) -> Result<String> {
    let output = exec.run_checked(&Invocation::query("uname").arg("-m"))?;
    Ok(output.stdout.trim().to_string())
}

/// The account whose profile and home directory receive per-user files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUser {
    pub name: String,
    /// Home directory as seen on the target system
    pub home: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

impl TargetUser {
    /// Resolve the user who invoked the installer.
    ///
    /// Under sudo this is `SUDO_USER`, not root. The account is looked up in
    /// the layout's `/etc/passwd`; a staged layout without an entry gets a
    /// synthetic `/home/<name>`.
    pub fn resolve(layout: &Layout, explicit: Option<&str>) -> Result<Self> {
        let name = match explicit {
            Some(name) => name.to_string(),
            None => invoking_user_name(),
        };

        let passwd = layout.resolve(Path::new("/etc/passwd"));
        if let Ok(contents) = std::fs::read_to_string(&passwd) {
            if let Some(user) = parse_passwd(&contents, &name) {
                return Ok(user);
            }
        }

        if layout.is_staged() {
            let home = if name == "root" {
                PathBuf::from("/root")
            } else {
                PathBuf::from("/home").join(&name)
            };
            tracing::debug!(
                "No passwd entry for {} in staging root, using {}",
                name,
                home.display()
            );
            return Ok(Self { name, home, uid: effective_uid(), gid: effective_gid() });
        }

        if std::env::var("USER").ok().as_deref() == Some(name.as_str()) {
            if let Some(home) = dirs::home_dir() {
                return Ok(Self { name, home, uid: effective_uid(), gid: effective_gid() });
            }
        }

        Err(SetupError::UserNotFound(name))
    }
}

fn invoking_user_name() -> String {
    std::env::var("SUDO_USER")
        .ok()
        .filter(|u| !u.is_empty() && u != "root")
        .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
        .unwrap_or_else(|| "root".to_string())
}

fn parse_passwd(contents: &str, name: &str) -> Option<TargetUser> {
    contents
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 || fields[0] != name {
                return None;
            }
            Some(TargetUser {
                name: name.to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                home: PathBuf::from(fields[5]),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Config;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
# comment line
pi:x:1000:1000:Pi,,,:/home/pi:/bin/bash
";

    #[test]
    fn parses_passwd_entry() {
        let user = parse_passwd(PASSWD, "pi").unwrap();
        assert_eq!(user.uid, 1000);
        assert_eq!(user.gid, 1000);
        assert_eq!(user.home, PathBuf::from("/home/pi"));
        assert!(parse_passwd(PASSWD, "nobody").is_none());
    }

    #[test]
    fn resolves_from_staged_passwd() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("etc")).unwrap();
        std::fs::write(tmp.path().join("etc/passwd"), PASSWD).unwrap();
        let layout = Layout::new(tmp.path(), &Config::default());

        let user = TargetUser::resolve(&layout, Some("pi")).unwrap();
        assert_eq!(user.home, PathBuf::from("/home/pi"));
    }

    #[test]
    fn staged_layout_synthesises_missing_user() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path(), &Config::default());

        let user = TargetUser::resolve(&layout, Some("operator")).unwrap();
        assert_eq!(user.home, PathBuf::from("/home/operator"));
        let root = TargetUser::resolve(&layout, Some("root")).unwrap();
        assert_eq!(root.home, PathBuf::from("/root"));
    }
}
