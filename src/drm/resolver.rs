//! Mode resolution
//!
//! Turns a connector id and a mode name into the encoder/CRTC pair that
//! will drive it. Nothing here touches hardware state; the caller commits.

use log::{debug, info};

use super::kms::{
    ConnectorInfo, CrtcSlot, EncoderInfo, KmsDevice, ModeError, ModeInfo, ModeSelection,
    ModeSummary,
};

/// Resolve `mode_name` on `connector_id`
///
/// Selection is deterministic for unchanged device state: the connector's
/// current encoder wins over its candidate list, and an encoder's assigned
/// CRTC wins over the lowest compatible pool index.
pub fn resolve<D: KmsDevice>(
    device: &D,
    connector_id: u32,
    mode_name: &str,
) -> Result<ModeSelection<D::Timing>, ModeError> {
    let crtcs = device.crtcs().map_err(ModeError::ResourcesUnavailable)?;

    let connector = device
        .connector(connector_id)
        .ok_or(ModeError::ConnectorNotFound(connector_id))?;

    let mode = find_mode(&connector, mode_name)?;
    debug!("Mode {} @ {}Hz found", mode.name, mode.vrefresh);

    let encoder = select_encoder(device, &connector)?;
    let crtc = select_crtc(&crtcs, &encoder)?;

    info!(
        "Connector {}: encoder {}, CRTC {}",
        connector_id, encoder.id, crtc.id
    );

    Ok(ModeSelection {
        connector: connector_id,
        mode,
        encoder: encoder.id,
        crtc,
    })
}

/// Exact, case-sensitive lookup in the connector's mode list
pub fn find_mode<T: Clone>(
    connector: &ConnectorInfo<T>,
    mode_name: &str,
) -> Result<ModeInfo<T>, ModeError> {
    connector
        .modes
        .iter()
        .find(|m| m.name == mode_name)
        .cloned()
        .ok_or_else(|| ModeError::ModeNotFound {
            connector: connector.id,
            name: mode_name.to_string(),
            available: available_modes(connector),
        })
}

/// Every mode the connector advertises, in driver order
pub fn available_modes<T>(connector: &ConnectorInfo<T>) -> Vec<ModeSummary> {
    connector
        .modes
        .iter()
        .map(|m| ModeSummary {
            name: m.name.clone(),
            vrefresh: m.vrefresh,
        })
        .collect()
}

fn select_encoder<D: KmsDevice>(
    device: &D,
    connector: &ConnectorInfo<D::Timing>,
) -> Result<EncoderInfo, ModeError> {
    if let Some(encoder) = connector.current_encoder.and_then(|id| device.encoder(id)) {
        debug!("Using current encoder {}", encoder.id);
        return Ok(encoder);
    }

    connector
        .encoders
        .iter()
        .find_map(|&id| device.encoder(id))
        .ok_or(ModeError::NoEncoder(connector.id))
}

/// Pick the CRTC for `encoder` from the device pool
pub fn select_crtc(crtcs: &[u32], encoder: &EncoderInfo) -> Result<CrtcSlot, ModeError> {
    if let Some(id) = encoder.crtc.filter(|&id| id != 0) {
        debug!("Encoder {} already drives CRTC {}", encoder.id, id);
        return Ok(CrtcSlot {
            id,
            index: crtcs.iter().position(|&c| c == id),
        });
    }

    crtcs
        .iter()
        .enumerate()
        .take(u32::BITS as usize)
        .find(|(index, _)| encoder.possible_crtcs & (1 << index) != 0)
        .map(|(index, &id)| CrtcSlot {
            id,
            index: Some(index),
        })
        .ok_or(ModeError::NoTimingController(encoder.id))
}
