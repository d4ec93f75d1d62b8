//! Mode holding loop
//!
//! Owns the device for the rest of the process lifetime. Wakes once per
//! poll interval, exits when the running flag is cleared and services any
//! pending reloads otherwise. Reloads re-read their parameter file and
//! re-apply it; both are idempotent, so coalesced signals are harmless.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;

use super::params::{read_margins_file, read_norm_file};
use super::{MasterPolicy, ServiceFlags, ServiceState};
use crate::drm::{apply_margins, apply_norm, KmsDevice};

/// Service behavior, normally derived from `config::ServiceConfig`
#[derive(Debug, Clone)]
pub struct HolderSettings {
    pub poll_interval: Duration,
    pub norm_file: PathBuf,
    pub margins_file: PathBuf,
    pub master: MasterPolicy,
}

pub struct ModeHolder<D: KmsDevice> {
    device: D,
    connector: u32,
    settings: HolderSettings,
    state: ServiceState,
}

impl<D: KmsDevice> ModeHolder<D> {
    /// Take over the device once the process runs detached
    pub fn new(device: D, connector: u32, settings: HolderSettings) -> Self {
        Self {
            device,
            connector,
            settings,
            state: ServiceState::Detached,
        }
    }

    /// Run until the running flag is cleared, then release the device
    pub fn run(mut self, flags: &ServiceFlags) -> ServiceState {
        self.state.advance(ServiceState::Running);
        let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]);
        info!(
            "Holding mode on connector {} ({:?} master)",
            self.connector, self.settings.master
        );

        while flags.is_running() {
            std::thread::sleep(self.settings.poll_interval);
            if !flags.is_running() {
                break;
            }
            self.service_pending(flags);
        }

        self.state.advance(ServiceState::Terminating);
        info!("Termination requested, releasing DRM device");
        let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);

        let Self {
            device, mut state, ..
        } = self;
        drop(device);
        state.advance(ServiceState::Exited);
        state
    }

    /// One wake: consume each pending flag and perform its reload
    pub fn service_pending(&self, flags: &ServiceFlags) {
        if flags.take_norm_reload() {
            self.reload_norm();
        }
        if flags.take_margins_reload() {
            self.reload_margins();
        }
    }

    /// Re-read the norm file and apply it; skipped if unusable
    pub fn reload_norm(&self) {
        let Some(norm) = read_norm_file(&self.settings.norm_file) else {
            debug!("Norm reload skipped");
            return;
        };
        self.with_master(|device| {
            apply_norm(device, self.connector, norm);
        });
    }

    /// Re-read the margins file and apply all four; skipped if unusable
    pub fn reload_margins(&self) {
        let Some(margins) = read_margins_file(&self.settings.margins_file) else {
            debug!("Margins reload skipped");
            return;
        };
        self.with_master(|device| {
            apply_margins(device, self.connector, &margins);
        });
    }

    /// Property writes need master. Under the yield policy it is taken
    /// back for the duration of the write, if nobody else holds it.
    fn with_master(&self, f: impl FnOnce(&D)) {
        match self.settings.master {
            MasterPolicy::Hold => f(&self.device),
            MasterPolicy::Yield => {
                if let Err(e) = self.device.acquire_master() {
                    warn!("Reload skipped, DRM master unavailable: {}", e);
                    return;
                }
                f(&self.device);
                if let Err(e) = self.device.release_master() {
                    warn!("Failed to drop DRM master after reload: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drm::fake::{FakeDevice, CONNECTOR};
    use std::time::Instant;

    struct TempFiles {
        dir: PathBuf,
    }

    impl TempFiles {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "crtmode-holder-{}-{}",
                tag,
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn write(&self, name: &str, content: &str) {
            std::fs::write(self.dir.join(name), content).unwrap();
        }

        fn settings(&self, master: MasterPolicy) -> HolderSettings {
            HolderSettings {
                poll_interval: Duration::from_millis(10),
                norm_file: self.dir.join("tvnorm"),
                margins_file: self.dir.join("margins"),
                master,
            }
        }
    }

    impl Drop for TempFiles {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn margin_values(dev: &FakeDevice) -> [Option<u64>; 4] {
        ["left margin", "right margin", "top margin", "bottom margin"]
            .map(|name| dev.property_value(name))
    }

    #[test]
    fn test_margins_reload_applies_four_values() {
        let files = TempFiles::new("margins");
        files.write("margins", "10 20 5 0\n");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        let flags = ServiceFlags::new();
        flags.request_margins_reload();
        holder.service_pending(&flags);

        assert_eq!(dev.writes().len(), 4);
        assert_eq!(margin_values(&dev), [Some(10), Some(20), Some(5), Some(0)]);
    }

    #[test]
    fn test_malformed_margins_write_nothing() {
        let files = TempFiles::new("bad-margins");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        files.write("margins", "1 2 3 4");
        holder.reload_margins();
        assert_eq!(dev.writes().len(), 4);

        for content in ["10 20 5", "a b c d"] {
            files.write("margins", content);
            holder.reload_margins();
            assert_eq!(dev.writes().len(), 4, "content {:?}", content);
            assert_eq!(margin_values(&dev), [Some(1), Some(2), Some(3), Some(4)]);
        }
    }

    #[test]
    fn test_missing_files_skip_reload() {
        let files = TempFiles::new("missing");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        holder.reload_norm();
        holder.reload_margins();
        assert!(dev.writes().is_empty());
    }

    #[test]
    fn test_norm_reload_keeps_previous_on_garbage() {
        let files = TempFiles::new("norm");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        files.write("tvnorm", "3\n");
        holder.reload_norm();
        assert_eq!(dev.property_value("TV mode"), Some(3));

        files.write("tvnorm", "ntsc\n");
        holder.reload_norm();
        assert_eq!(dev.property_value("TV mode"), Some(3));
        assert_eq!(dev.writes().len(), 1);
    }

    #[test]
    fn test_only_pending_reloads_run() {
        let files = TempFiles::new("pending");
        files.write("tvnorm", "0");
        files.write("margins", "1 1 1 1");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        let flags = ServiceFlags::new();
        holder.service_pending(&flags);
        assert!(dev.writes().is_empty());

        flags.request_norm_reload();
        holder.service_pending(&flags);
        assert_eq!(dev.writes().len(), 1);
        holder.service_pending(&flags);
        assert_eq!(dev.writes().len(), 1);
    }

    #[test]
    fn test_yield_policy_reacquires_master_for_reload() {
        let files = TempFiles::new("yield");
        files.write("tvnorm", "3");
        let dev = FakeDevice::composite();
        dev.is_master.set(false);
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Yield));

        holder.reload_norm();
        assert_eq!(dev.property_value("TV mode"), Some(3));
        assert!(!dev.is_master.get());
    }

    #[test]
    fn test_yield_policy_skips_when_master_taken() {
        let files = TempFiles::new("yield-busy");
        files.write("tvnorm", "3");
        let dev = FakeDevice::composite();
        dev.is_master.set(false);
        dev.master_available.set(false);
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Yield));

        holder.reload_norm();
        assert!(dev.writes().is_empty());
    }

    #[test]
    fn test_stop_before_wake_skips_pending_reloads() {
        let files = TempFiles::new("stop");
        files.write("margins", "10 20 5 0");
        let dev = FakeDevice::composite();
        let holder = ModeHolder::new(&dev, CONNECTOR, files.settings(MasterPolicy::Hold));

        let flags = ServiceFlags::new();
        flags.request_margins_reload();
        flags.request_stop();

        assert_eq!(holder.run(&flags), ServiceState::Exited);
        assert!(dev.writes().is_empty());
    }

    #[test_log::test]
    fn test_stop_signal_ends_loop_within_interval() {
        let files = TempFiles::new("loop");
        files.write("tvnorm", "0");
        let dev = FakeDevice::composite();
        let settings = files.settings(MasterPolicy::Hold);
        let interval = settings.poll_interval;
        let holder = ModeHolder::new(&dev, CONNECTOR, settings);

        let flags = ServiceFlags::new();
        flags.request_norm_reload();

        let (stop_at, exit_at) = std::thread::scope(|s| {
            let stopper = s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                let at = Instant::now();
                flags.request_stop();
                at
            });
            let state = holder.run(&flags);
            let exit_at = Instant::now();
            assert_eq!(state, ServiceState::Exited);
            (stopper.join().unwrap(), exit_at)
        });

        // The pending norm reload ran while the service was up
        assert_eq!(dev.property_value("TV mode"), Some(0));
        assert!(exit_at.duration_since(stop_at) < interval + Duration::from_millis(500));
    }
}
