//! DRM device management
//!
//! Opens the DRM device (/dev/dri/card*) and exposes its connectors,
//! encoders, CRTCs and connector properties through `KmsDevice`.
//!
//! The opened `Device` is the only handle the process keeps, and with it the
//! DRM master status the kernel granted on open. Dropping it releases master,
//! which lets the driver restore its default output timing.

use anyhow::{Context, Result};
use drm::control::{
    connector, crtc, encoder, from_u32, property, Device as ControlDevice, ResourceHandles,
};
use drm::Device as BasicDevice;
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::Path;

use super::display::set_crtc_keep_fb;
use super::ioctl_helpers::ioctl_no_arg;
use super::kms::{ConnectorInfo, EncoderInfo, KmsDevice, ModeError, ModeInfo, PropertyInfo};

/// DRM device wrapper
pub struct Device {
    file: File,
}

// Trait implementations required by drm crate
impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl BasicDevice for Device {}
impl ControlDevice for Device {}

impl Device {
    /// Open DRM device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/dri/card0")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening DRM device: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Cannot open DRM device {}", path.display()))?;

        let device = Self { file };

        // Opening a primary node makes us master if nobody else holds it.
        // Resources are only logged here; every query re-fetches them.
        match device.resource_handles() {
            Ok(resources) => info!(
                "DRM resources: connectors={}, crtcs={}, encoders={}",
                resources.connectors().len(),
                resources.crtcs().len(),
                resources.encoders().len(),
            ),
            Err(e) => warn!("Failed to get DRM resources: {}", e),
        }

        Ok(device)
    }

    /// Open the first candidate path that succeeds
    pub fn open_first<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ModeError> {
        for path in paths {
            match Self::open(path) {
                Ok(device) => return Ok(device),
                Err(e) => debug!("{:#}", e),
            }
        }
        Err(ModeError::DeviceUnavailable {
            tried: paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect(),
        })
    }

    /// Get RawFd
    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn resources(&self) -> io::Result<ResourceHandles> {
        self.resource_handles()
    }

    /// Drop DRM master privileges
    pub fn drop_master(&self) -> io::Result<()> {
        ioctl_no_arg(
            self.as_raw_fd(),
            drm_ioctl::DRM_IOCTL_DROP_MASTER,
            "DROP_MASTER",
        )?;
        info!("DRM master dropped");
        Ok(())
    }

    /// Acquire DRM master privileges
    pub fn set_master(&self) -> io::Result<()> {
        ioctl_no_arg(
            self.as_raw_fd(),
            drm_ioctl::DRM_IOCTL_SET_MASTER,
            "SET_MASTER",
        )?;
        info!("DRM master acquired");
        Ok(())
    }
}

impl KmsDevice for Device {
    type Timing = drm::control::Mode;

    fn crtcs(&self) -> io::Result<Vec<u32>> {
        Ok(self
            .resources()?
            .crtcs()
            .iter()
            .map(|&h| u32::from(h))
            .collect())
    }

    fn connector(&self, id: u32) -> Option<ConnectorInfo<Self::Timing>> {
        let handle: connector::Handle = from_u32(id)?;
        let info = match ControlDevice::get_connector(self, handle, false) {
            Ok(info) => info,
            Err(e) => {
                debug!("Failed to get connector {} info: {}", id, e);
                return None;
            }
        };

        let modes = info
            .modes()
            .iter()
            .map(|m| ModeInfo {
                name: m.name().to_string_lossy().into_owned(),
                vrefresh: m.vrefresh(),
                timing: *m,
            })
            .collect();

        Some(ConnectorInfo {
            id,
            modes,
            encoders: info.encoders().iter().map(|&h| u32::from(h)).collect(),
            current_encoder: info.current_encoder().map(u32::from),
        })
    }

    fn encoder(&self, id: u32) -> Option<EncoderInfo> {
        let handle: encoder::Handle = from_u32(id)?;
        let info = match ControlDevice::get_encoder(self, handle) {
            Ok(info) => info,
            Err(e) => {
                debug!("Failed to get encoder {} info: {}", id, e);
                return None;
            }
        };

        // The drm crate keeps the raw mask private; rebuild it against the pool order
        let resources = self.resources().ok()?;
        let allowed: Vec<crtc::Handle> = resources.filter_crtcs(info.possible_crtcs());
        let possible_crtcs = resources
            .crtcs()
            .iter()
            .enumerate()
            .take(u32::BITS as usize)
            .filter(|(_, h)| allowed.contains(h))
            .fold(0u32, |mask, (index, _)| mask | (1 << index));

        Some(EncoderInfo {
            id,
            crtc: info.crtc().map(u32::from),
            possible_crtcs,
        })
    }

    fn connector_properties(&self, connector: u32) -> io::Result<Vec<PropertyInfo>> {
        let handle: connector::Handle = from_u32(connector)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        let set = self.get_properties(handle)?;
        let (handles, _values) = set.as_props_and_values();

        let mut props = Vec::with_capacity(handles.len());
        for &prop in handles {
            // Properties that fail to describe themselves are skipped, as with libdrm
            match self.get_property(prop) {
                Ok(info) => props.push(PropertyInfo {
                    id: u32::from(prop),
                    name: info.name().to_string_lossy().into_owned(),
                }),
                Err(e) => debug!("Failed to get property {:?}: {}", prop, e),
            }
        }
        Ok(props)
    }

    fn set_connector_property(&self, connector: u32, prop: u32, value: u64) -> io::Result<()> {
        let handle: connector::Handle = from_u32(connector)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        let prop: property::Handle =
            from_u32(prop).ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        self.set_property(handle, prop, value)
    }

    fn set_crtc(&self, crtc: u32, connector: u32, timing: &Self::Timing) -> io::Result<()> {
        set_crtc_keep_fb(self.as_raw_fd(), crtc, connector, timing)
    }

    fn acquire_master(&self) -> io::Result<()> {
        self.set_master()
    }

    fn release_master(&self) -> io::Result<()> {
        self.drop_master()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Release DRM master privileges; fails harmlessly if already dropped
        let _ = ioctl_no_arg(
            self.file.as_raw_fd(),
            drm_ioctl::DRM_IOCTL_DROP_MASTER,
            "DROP_MASTER",
        );
        debug!("DRM device closed");
    }
}

// DRM ioctl constants
mod drm_ioctl {
    // Linux: include/uapi/drm/drm.h
    // _IO('d', 0x1e) = SET_MASTER, _IO('d', 0x1f) = DROP_MASTER
    const DRM_IOCTL_BASE: u8 = 0x64;
    pub const DRM_IOCTL_SET_MASTER: libc::c_ulong =
        nix::request_code_none!(DRM_IOCTL_BASE, 0x1e) as libc::c_ulong;
    pub const DRM_IOCTL_DROP_MASTER: libc::c_ulong =
        nix::request_code_none!(DRM_IOCTL_BASE, 0x1f) as libc::c_ulong;
}
