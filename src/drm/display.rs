//! Mode commit
//!
//! Binds one connector to a CRTC with the resolved mode. The scanout
//! framebuffer is left untouched: only timing changes.

use log::{debug, info};
use std::io;
use std::os::unix::io::RawFd;

use super::ioctl_helpers::ioctl_with_mut_arg;
use super::kms::{KmsDevice, ModeError, ModeSelection};

/// `fb_id` sentinel asking SETCRTC to keep the current framebuffer
const FB_KEEP_CURRENT: u32 = u32::MAX;

/// Commit a resolved selection
pub fn commit<D: KmsDevice>(device: &D, selection: &ModeSelection<D::Timing>) -> Result<(), ModeError> {
    device
        .set_crtc(selection.crtc.id, selection.connector, &selection.mode.timing)
        .map_err(|source| ModeError::CommitFailed {
            crtc: selection.crtc.id,
            source,
        })?;

    info!(
        "Mode {} set on connector {} (encoder {}, CRTC {})",
        selection.mode.name, selection.connector, selection.encoder, selection.crtc.id
    );
    debug!("CRTC pool index: {:?}", selection.crtc.index);
    Ok(())
}

/// DRM_IOCTL_MODE_SETCRTC for a single connector, keeping the framebuffer
pub fn set_crtc_keep_fb(
    fd: RawFd,
    crtc: u32,
    connector: u32,
    mode: &drm::control::Mode,
) -> io::Result<()> {
    let connectors = [connector];
    let mut req = drm_ffi::drm_mode_crtc {
        set_connectors_ptr: connectors.as_ptr() as u64,
        count_connectors: connectors.len() as u32,
        crtc_id: crtc,
        fb_id: FB_KEEP_CURRENT,
        x: 0,
        y: 0,
        gamma_size: 0,
        mode_valid: 1,
        mode: drm_ffi::drm_mode_modeinfo::from(*mode),
    };

    // SAFETY: `req` matches the kernel's struct drm_mode_crtc and
    // `connectors` outlives the call.
    unsafe { ioctl_with_mut_arg(fd, DRM_IOCTL_MODE_SETCRTC, &mut req, "MODE_SETCRTC") }
}

const DRM_IOCTL_MODE_SETCRTC: libc::c_ulong =
    nix::request_code_readwrite!(0x64, 0xA2, std::mem::size_of::<drm_ffi::drm_mode_crtc>())
        as libc::c_ulong;
