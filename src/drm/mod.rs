//! DRM/KMS mode setting

pub mod device;
pub mod display;
#[cfg(test)]
pub mod fake;
mod ioctl_helpers;
pub mod kms;
pub mod property;
pub mod resolver;

pub use device::Device;
pub use display::commit;
pub use kms::{KmsDevice, ModeError};
pub use property::{apply_margins, apply_norm, norm_for_mode, Margins};
pub use resolver::{available_modes, resolve};
