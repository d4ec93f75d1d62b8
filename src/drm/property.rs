//! Connector property control
//!
//! Properties are looked up by name on every call. Their presence depends on
//! the connector and driver, so a missing property is an outcome, not an
//! error.

use std::io;

use log::{debug, info, warn};

use super::kms::KmsDevice;
use crate::constants::{
    NORM_NTSC, NORM_PAL, PROP_BOTTOM_MARGIN, PROP_LEFT_MARGIN, PROP_RIGHT_MARGIN,
    PROP_TOP_MARGIN, PROP_TV_MODE,
};

/// Whether the named property exists on the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOutcome {
    Found,
    NotFound,
}

/// Overscan compensation, one value per edge (expected 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

/// Set a connector property by name
///
/// Returns `NotFound` when the connector has no such property. A write that
/// the driver rejects is logged; the lookup outcome is still `Found`. Only a
/// failure to enumerate the connector's properties is returned as an error.
pub fn set_property<D: KmsDevice>(
    device: &D,
    connector: u32,
    name: &str,
    value: u64,
) -> io::Result<PropertyOutcome> {
    let props = device.connector_properties(connector)?;

    let Some(prop) = props.iter().find(|p| p.name == name) else {
        debug!("Connector {} has no '{}' property", connector, name);
        return Ok(PropertyOutcome::NotFound);
    };

    match device.set_connector_property(connector, prop.id, value) {
        Ok(()) => debug!("'{}' = {} on connector {}", name, value, connector),
        Err(e) => warn!("Failed to set '{}' on connector {}: {}", name, connector, e),
    }
    Ok(PropertyOutcome::Found)
}

/// Best-effort wrapper: enumeration errors are logged and reported as `NotFound`
fn set_best_effort<D: KmsDevice>(
    device: &D,
    connector: u32,
    name: &str,
    value: u64,
) -> PropertyOutcome {
    match set_property(device, connector, name, value) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to get connector {} properties: {}", connector, e);
            PropertyOutcome::NotFound
        }
    }
}

/// Norm implied by a mode name: 576/288-line modes are PAL, the rest NTSC
pub fn norm_for_mode(mode_name: &str) -> i32 {
    if mode_name.contains("576") || mode_name.contains("288") {
        NORM_PAL
    } else {
        NORM_NTSC
    }
}

/// Apply a video norm through the "TV mode" property
pub fn apply_norm<D: KmsDevice>(device: &D, connector: u32, norm: i32) -> PropertyOutcome {
    let outcome = set_best_effort(device, connector, PROP_TV_MODE, norm as u64);
    match outcome {
        PropertyOutcome::Found => info!("TV mode set to {}", norm),
        PropertyOutcome::NotFound => {
            warn!("Connector {} has no '{}' property", connector, PROP_TV_MODE)
        }
    }
    outcome
}

/// Apply all four margins, each as an independent write
pub fn apply_margins<D: KmsDevice>(
    device: &D,
    connector: u32,
    margins: &Margins,
) -> [PropertyOutcome; 4] {
    info!(
        "Setting margins: L={} R={} T={} B={}",
        margins.left, margins.right, margins.top, margins.bottom
    );
    [
        (PROP_LEFT_MARGIN, margins.left),
        (PROP_RIGHT_MARGIN, margins.right),
        (PROP_TOP_MARGIN, margins.top),
        (PROP_BOTTOM_MARGIN, margins.bottom),
    ]
    .map(|(name, value)| set_best_effort(device, connector, name, value as u64))
}
