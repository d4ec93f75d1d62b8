//! Safe wrappers for ioctl system calls
//!
//! Both wrappers retry on EINTR, like libdrm's `drmIoctl`: the holding
//! service takes reload signals while it may be inside a device call.

use log::trace;
use std::io;
use std::os::unix::io::RawFd;

/// Execute an ioctl command that takes no argument.
///
/// # Arguments
/// * `fd` - File descriptor
/// * `cmd` - ioctl command number
/// * `cmd_name` - Human-readable name for tracing
pub fn ioctl_no_arg(fd: RawFd, cmd: libc::c_ulong, cmd_name: &str) -> io::Result<()> {
    retry_eintr(cmd_name, || unsafe { libc::ioctl(fd, cmd) })
}

/// Execute an ioctl command with a mutable argument.
///
/// # Safety
/// The caller must ensure the argument type matches what the ioctl expects
/// and that any pointers inside it stay valid for the duration of the call.
///
/// # Arguments
/// * `fd` - File descriptor
/// * `cmd` - ioctl command number
/// * `arg` - Mutable reference to the argument
/// * `cmd_name` - Human-readable name for tracing
pub unsafe fn ioctl_with_mut_arg<T>(
    fd: RawFd,
    cmd: libc::c_ulong,
    arg: &mut T,
    cmd_name: &str,
) -> io::Result<()> {
    let ptr = arg as *mut T;
    retry_eintr(cmd_name, || libc::ioctl(fd, cmd, ptr))
}

fn retry_eintr(cmd_name: &str, mut call: impl FnMut() -> libc::c_int) -> io::Result<()> {
    loop {
        if call() >= 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            trace!("{} failed: {}", cmd_name, err);
            return Err(err);
        }
        // EINTR: retry the ioctl
    }
}
