//! Background detachment and the PID record

use anyhow::{Context, Result};
use log::{info, warn};
use nix::unistd::{fork, setsid, ForkResult};
use std::path::{Path, PathBuf};

/// Detach from the controlling session and continue in the background
///
/// The parent prints the child's PID and exits with status 0 without running
/// destructors: its copy of the DRM fd shares the open file with the child,
/// and dropping the `Device` there would release master for both.
pub fn detach_into_background() -> Result<()> {
    // SAFETY: called before any thread is spawned
    match unsafe { fork() }.context("fork failed")? {
        ForkResult::Parent { child } => {
            println!("{}", child);
            std::process::exit(0);
        }
        ForkResult::Child => {
            setsid().context("setsid failed")?;
            info!("Detached into background");
            Ok(())
        }
    }
}

/// PID file written at service start and removed on drop
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::write(&path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write PID file {}", path.display()))?;
        info!("PID file: {}", path.display());
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove PID file {}: {}", self.path.display(), e);
        }
    }
}
