//! Global constants for crtmode
//!
//! Well-known paths, connector property names and video norm codes.

// ============================================================================
// Device
// ============================================================================

/// DRM device candidates, tried in order (Pi 4 with vc4 exposes card1)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &["/dev/dri/card1", "/dev/dri/card0"];

// ============================================================================
// Service files
// ============================================================================

/// PID record written by the holding service
pub const DEFAULT_PID_FILE: &str = "/tmp/crt-setmode.pid";

/// Norm parameter file (single integer), re-read on SIGUSR1
pub const DEFAULT_NORM_FILE: &str = "/tmp/crt-tvnorm";

/// Margins parameter file (left right top bottom), re-read on SIGUSR2
pub const DEFAULT_MARGINS_FILE: &str = "/tmp/crt-margins";

/// Service loop wake interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Connector properties
// ============================================================================

/// Analog TV norm property
pub const PROP_TV_MODE: &str = "TV mode";

pub const PROP_LEFT_MARGIN: &str = "left margin";
pub const PROP_RIGHT_MARGIN: &str = "right margin";
pub const PROP_TOP_MARGIN: &str = "top margin";
pub const PROP_BOTTOM_MARGIN: &str = "bottom margin";

// ============================================================================
// Video norms
// ============================================================================

/// NTSC norm code for the "TV mode" property
pub const NORM_NTSC: i32 = 0;

/// PAL norm code for the "TV mode" property
pub const NORM_PAL: i32 = 3;
