// src/hooks.rs

//! Lifecycle hook execution
//!
//! An `install.anemonix` script may define any of the shell functions
//! `post_common`, `post_install`, and `post_remove`. The runner sources the
//! script under `/bin/sh -e`, invokes `post_common` if defined, then the
//! named hook if defined. When an install root other than `/` is configured
//! the script runs inside `chroot`.
//!
//! Hook failures never revert committed state; callers report them as
//! warnings.

use crate::error::{Error, Result};
use crate::ui;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Hooks that run longer than this are killed and reported failed.
const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Run `hook` from the stored script, chrooting into `root` unless it is `/`.
pub fn run_hook(script_path: &Path, hook: &str, root: &Path) -> Result<()> {
    if !script_path.exists() {
        ui::info(format!(
            "script '{}' not found; skipping hooks",
            script_path.display()
        ));
        return Ok(());
    }

    let do_chroot = root != Path::new("/");

    // Inside the chroot the script is addressed relative to the new root.
    let in_root_path = if do_chroot {
        match script_path.strip_prefix(root) {
            Ok(rel) => Path::new("/").join(rel),
            Err(_) => script_path.to_path_buf(),
        }
    } else {
        script_path.to_path_buf()
    };

    let inner = format!(
        ". '{}'; \
         if command -v post_common >/dev/null 2>&1; then post_common; fi; \
         if command -v {hook} >/dev/null 2>&1; then {hook}; fi",
        in_root_path.display()
    );

    let mut command = if do_chroot {
        let mut c = Command::new("chroot");
        c.arg(root).arg("/bin/sh");
        c
    } else {
        Command::new("/bin/sh")
    };

    debug!("Running hook '{}' from {}", hook, script_path.display());

    let mut child = command
        .arg("-e")
        .arg("-c")
        .arg(&inner)
        .stdin(Stdio::null())
        .spawn()?;

    let status = match child.wait_timeout(HOOK_TIMEOUT)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            warn!("hook '{}' timed out after {:?}", hook, HOOK_TIMEOUT);
            return Err(Error::HookNonZero {
                hook: hook.to_string(),
                code: -1,
            });
        }
    };

    if status.success() {
        info!("hook '{}' completed", hook);
        Ok(())
    } else {
        Err(Error::HookNonZero {
            hook: hook.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_script_is_skipped() {
        let result = run_hook(Path::new("/nonexistent/script"), "post_install", Path::new("/"));
        assert!(result.is_ok());
    }

    #[test]
    fn hook_function_is_invoked() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = dir.path().join("install.anemonix");
        fs::write(
            &script,
            format!("post_install() {{ touch '{}'; }}\n", marker.display()),
        )
        .unwrap();

        run_hook(&script, "post_install", Path::new("/")).unwrap();
        assert!(marker.exists());
    }

    #[test]
    fn post_common_runs_before_named_hook() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        let script = dir.path().join("install.anemonix");
        fs::write(
            &script,
            format!(
                "post_common() {{ echo common >> '{log}'; }}\n\
                 post_install() {{ echo install >> '{log}'; }}\n",
                log = log.display()
            ),
        )
        .unwrap();

        run_hook(&script, "post_install", Path::new("/")).unwrap();
        let content = fs::read_to_string(&log).unwrap();
        assert_eq!(content, "common\ninstall\n");
    }

    #[test]
    fn undefined_hook_is_a_no_op() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("install.anemonix");
        fs::write(&script, "post_install() { :; }\n").unwrap();

        // script defines no post_remove; sourcing alone must succeed
        run_hook(&script, "post_remove", Path::new("/")).unwrap();
    }

    #[test]
    fn failing_hook_reports_exit_code() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("install.anemonix");
        fs::write(&script, "post_install() { exit 7; }\n").unwrap();

        let err = run_hook(&script, "post_install", Path::new("/")).unwrap_err();
        match err {
            Error::HookNonZero { hook, code } => {
                assert_eq!(hook, "post_install");
                assert_eq!(code, 7);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
