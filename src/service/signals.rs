//! Signal flags for the holding service
//!
//! Handlers only store to atomics. The main loop consumes the flags and does
//! all file and device I/O itself.
//!
//! - SIGTERM / SIGINT: stop
//! - SIGUSR1: reload the norm file
//! - SIGUSR2: reload the margins file

use anyhow::{anyhow, Result};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ReloadPolicy;

/// Running flag plus one pending flag per reload kind
#[derive(Debug)]
pub struct ServiceFlags {
    running: AtomicBool,
    reload_norm: AtomicBool,
    reload_margins: AtomicBool,
}

impl Default for ServiceFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceFlags {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reload_norm: AtomicBool::new(false),
            reload_margins: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn request_norm_reload(&self) {
        self.reload_norm.store(true, Ordering::SeqCst);
    }

    pub fn request_margins_reload(&self) {
        self.reload_margins.store(true, Ordering::SeqCst);
    }

    /// Test-and-clear; a request arriving after this call stays pending
    pub fn take_norm_reload(&self) -> bool {
        self.reload_norm.swap(false, Ordering::SeqCst)
    }

    /// Test-and-clear; a request arriving after this call stays pending
    pub fn take_margins_reload(&self) -> bool {
        self.reload_margins.swap(false, Ordering::SeqCst)
    }
}

/// Flags written by the process signal handlers
pub static SERVICE_FLAGS: ServiceFlags = ServiceFlags::new();

extern "C" fn service_signal_handler(signo: libc::c_int) {
    match signo {
        libc::SIGUSR1 => SERVICE_FLAGS.request_norm_reload(),
        libc::SIGUSR2 => SERVICE_FLAGS.request_margins_reload(),
        _ => SERVICE_FLAGS.request_stop(),
    }
}

fn set_disposition(signo: libc::c_int, handler: libc::sighandler_t) -> Result<()> {
    let prev = unsafe { libc::signal(signo, handler) };
    if prev == libc::SIG_ERR {
        return Err(anyhow!(
            "signal({}) failed: {}",
            signo,
            std::io::Error::last_os_error()
        ));
    }
    Ok(())
}

/// Install the service signal dispositions (call once, after detaching)
///
/// With `ReloadPolicy::Static` the reload signals are ignored instead.
pub fn install_handlers(reload: ReloadPolicy) -> Result<()> {
    let handler = service_signal_handler as *const () as libc::sighandler_t;

    set_disposition(libc::SIGTERM, handler)?;
    set_disposition(libc::SIGINT, handler)?;

    match reload {
        ReloadPolicy::Reloadable => {
            set_disposition(libc::SIGUSR1, handler)?;
            set_disposition(libc::SIGUSR2, handler)?;
            info!("Signal handlers installed (SIGUSR1=norm, SIGUSR2=margins)");
        }
        ReloadPolicy::Static => {
            set_disposition(libc::SIGUSR1, libc::SIG_IGN)?;
            set_disposition(libc::SIGUSR2, libc::SIG_IGN)?;
            info!("Signal handlers installed (reload disabled)");
        }
    }
    Ok(())
}
