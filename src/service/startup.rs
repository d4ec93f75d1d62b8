//! Initial mode set, before the process detaches

use log::{info, warn};

use super::MasterPolicy;
use crate::drm::{apply_norm, commit, resolve, KmsDevice, ModeError};

/// Resolve `mode` on `connector`, apply `norm`, commit, and apply the
/// master policy
///
/// Nothing is written to the device unless resolution succeeds. Under
/// `MasterPolicy::Yield` master is released right after the commit; a
/// failure to release it is only logged.
pub fn establish_mode<D: KmsDevice>(
    device: &D,
    connector: u32,
    mode: &str,
    norm: i32,
    master: MasterPolicy,
) -> Result<(), ModeError> {
    let selection = resolve(device, connector, mode)?;

    info!(
        "Setting mode {} on connector {} (TV norm: {})",
        mode, connector, norm
    );

    // The norm must be in place before the switch for PAL modes
    apply_norm(device, connector, norm);
    commit(device, &selection)?;
    info!("Mode set successfully");

    if master == MasterPolicy::Yield {
        if let Err(e) = device.release_master() {
            warn!("Failed to drop DRM master: {}", e);
        }
    }
    Ok(())
}
