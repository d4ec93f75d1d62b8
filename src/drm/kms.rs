//! KMS object model
//!
//! Plain snapshots of the connector, encoder, CRTC and property objects the
//! resolver and property controller work with, plus the `KmsDevice` trait
//! that produces them. Snapshots are fetched fresh for every operation and
//! never cached.

use std::fmt;
use std::io;

use thiserror::Error;

/// A display mode advertised by a connector
#[derive(Debug, Clone, PartialEq)]
pub struct ModeInfo<T> {
    /// Exact-match key (e.g. "720x576i")
    pub name: String,
    /// Vertical refresh in Hz, only used for diagnostics
    pub vrefresh: u32,
    /// Opaque timing payload handed back to the commit
    pub timing: T,
}

/// Connector snapshot
#[derive(Debug, Clone)]
pub struct ConnectorInfo<T> {
    pub id: u32,
    pub modes: Vec<ModeInfo<T>>,
    /// Candidate encoders in driver order
    pub encoders: Vec<u32>,
    /// Encoder currently driving this connector, if any
    pub current_encoder: Option<u32>,
}

/// Encoder snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderInfo {
    pub id: u32,
    /// CRTC currently assigned to this encoder, if any
    pub crtc: Option<u32>,
    /// Bit `i` set means the encoder can be driven by CRTC pool index `i`
    pub possible_crtcs: u32,
}

/// A CRTC and its position in the device's CRTC pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrtcSlot {
    pub id: u32,
    /// Pool index, `None` when an encoder-assigned CRTC is missing from the pool
    pub index: Option<usize>,
}

/// Named connector property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: u32,
    pub name: String,
}

/// Mode name and refresh rate, kept for the not-found listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSummary {
    pub name: String,
    pub vrefresh: u32,
}

impl fmt::Display for ModeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}Hz", self.name, self.vrefresh)
    }
}

/// Result of a successful resolution, ready to be committed
#[derive(Debug, Clone)]
pub struct ModeSelection<T> {
    pub connector: u32,
    pub mode: ModeInfo<T>,
    pub encoder: u32,
    pub crtc: CrtcSlot,
}

/// Fatal mode-setting errors
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("no DRM device could be opened (tried: {})", .tried.join(", "))]
    DeviceUnavailable { tried: Vec<String> },

    #[error("failed to get DRM resources: {0}")]
    ResourcesUnavailable(#[source] io::Error),

    #[error("connector {0} not found")]
    ConnectorNotFound(u32),

    #[error("mode '{name}' not found on connector {connector}. Available modes:{}", listing(.available))]
    ModeNotFound {
        connector: u32,
        name: String,
        available: Vec<ModeSummary>,
    },

    #[error("no encoder found for connector {0}")]
    NoEncoder(u32),

    #[error("no CRTC available for encoder {0}")]
    NoTimingController(u32),

    #[error("failed to set mode on CRTC {crtc}: {source}")]
    CommitFailed {
        crtc: u32,
        #[source]
        source: io::Error,
    },
}

fn listing(modes: &[ModeSummary]) -> String {
    if modes.is_empty() {
        return " (none)".to_string();
    }
    modes.iter().map(|m| format!("\n  {}", m)).collect()
}

/// Access to the KMS objects of one DRM device
///
/// Every call is a blocking ioctl on real hardware. `Device` implements this
/// over the `drm` crate; tests use an in-memory fake.
pub trait KmsDevice {
    /// Timing payload carried by `ModeInfo`
    type Timing: Clone;

    /// CRTC ids in pool order (position = bit index in `possible_crtcs`)
    fn crtcs(&self) -> io::Result<Vec<u32>>;

    /// Connector snapshot, `None` if the id does not name a connector
    fn connector(&self, id: u32) -> Option<ConnectorInfo<Self::Timing>>;

    /// Encoder snapshot, `None` if it cannot be fetched
    fn encoder(&self, id: u32) -> Option<EncoderInfo>;

    /// Every property exposed by a connector
    fn connector_properties(&self, connector: u32) -> io::Result<Vec<PropertyInfo>>;

    fn set_connector_property(&self, connector: u32, property: u32, value: u64) -> io::Result<()>;

    /// SETCRTC with the current framebuffer kept
    fn set_crtc(&self, crtc: u32, connector: u32, timing: &Self::Timing) -> io::Result<()>;

    fn acquire_master(&self) -> io::Result<()>;

    fn release_master(&self) -> io::Result<()>;
}

impl<T: KmsDevice + ?Sized> KmsDevice for &T {
    type Timing = T::Timing;

    fn crtcs(&self) -> io::Result<Vec<u32>> {
        (**self).crtcs()
    }

    fn connector(&self, id: u32) -> Option<ConnectorInfo<Self::Timing>> {
        (**self).connector(id)
    }

    fn encoder(&self, id: u32) -> Option<EncoderInfo> {
        (**self).encoder(id)
    }

    fn connector_properties(&self, connector: u32) -> io::Result<Vec<PropertyInfo>> {
        (**self).connector_properties(connector)
    }

    fn set_connector_property(&self, connector: u32, property: u32, value: u64) -> io::Result<()> {
        (**self).set_connector_property(connector, property, value)
    }

    fn set_crtc(&self, crtc: u32, connector: u32, timing: &Self::Timing) -> io::Result<()> {
        (**self).set_crtc(crtc, connector, timing)
    }

    fn acquire_master(&self) -> io::Result<()> {
        (**self).acquire_master()
    }

    fn release_master(&self) -> io::Result<()> {
        (**self).release_master()
    }
}
