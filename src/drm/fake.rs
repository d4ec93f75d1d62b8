//! In-memory `KmsDevice` for unit tests
//!
//! Records every property write and commit so tests can assert on the exact
//! hardware traffic an operation would have produced.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;

use super::kms::{ConnectorInfo, EncoderInfo, KmsDevice, ModeInfo, PropertyInfo};

pub const CONNECTOR: u32 = 45;
pub const ENCODER: u32 = 50;

/// Timing payloads are plain tags in tests
pub type FakeTiming = u32;

/// One recorded device operation, in issue order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOp {
    /// Property write as (property name, value)
    Write(String, u64),
    /// Commit as (crtc, timing)
    Commit(u32, FakeTiming),
}

pub struct FakeDevice {
    pub crtcs: Vec<u32>,
    pub connectors: Vec<ConnectorInfo<FakeTiming>>,
    pub encoders: Vec<EncoderInfo>,
    pub properties: HashMap<u32, Vec<PropertyInfo>>,
    pub fail_commit: bool,
    pub fail_writes: bool,
    /// Whether SET_MASTER succeeds (false = another process holds master)
    pub master_available: Cell<bool>,
    pub is_master: Cell<bool>,
    values: RefCell<HashMap<(u32, u32), u64>>,
    writes: RefCell<Vec<(u32, String, u64)>>,
    commits: RefCell<Vec<(u32, u32, FakeTiming)>>,
    history: RefCell<Vec<FakeOp>>,
}

fn mode(name: &str, vrefresh: u32, timing: FakeTiming) -> ModeInfo<FakeTiming> {
    ModeInfo {
        name: name.to_string(),
        vrefresh,
        timing,
    }
}

impl FakeDevice {
    /// Composite output similar to a Raspberry Pi vc4 TV encoder
    ///
    /// Three CRTCs (ids 60, 70, 80); the only encoder is unassigned and may
    /// be driven by pool indices 1 and 2.
    pub fn composite() -> Self {
        let connector = ConnectorInfo {
            id: CONNECTOR,
            modes: vec![
                mode("720x480i", 60, 1),
                mode("720x240", 60, 2),
                mode("720x576i", 50, 3),
                mode("720x288", 50, 4),
            ],
            encoders: vec![ENCODER],
            current_encoder: None,
        };
        let encoder = EncoderInfo {
            id: ENCODER,
            crtc: None,
            possible_crtcs: 0b110,
        };
        let props = vec![
            prop(100, "TV mode"),
            prop(101, "left margin"),
            prop(102, "right margin"),
            prop(103, "top margin"),
            prop(104, "bottom margin"),
        ];

        Self {
            crtcs: vec![60, 70, 80],
            connectors: vec![connector],
            encoders: vec![encoder],
            properties: HashMap::from([(CONNECTOR, props)]),
            fail_commit: false,
            fail_writes: false,
            master_available: Cell::new(true),
            is_master: Cell::new(true),
            values: RefCell::new(HashMap::new()),
            writes: RefCell::new(Vec::new()),
            commits: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Same as `composite` but the connector exposes no properties at all
    pub fn without_properties() -> Self {
        let mut dev = Self::composite();
        dev.properties.clear();
        dev
    }

    pub fn connector_mut(&mut self) -> &mut ConnectorInfo<FakeTiming> {
        &mut self.connectors[0]
    }

    pub fn encoder_mut(&mut self) -> &mut EncoderInfo {
        &mut self.encoders[0]
    }

    /// Current value of a named property on the test connector
    pub fn property_value(&self, name: &str) -> Option<u64> {
        let id = self
            .properties
            .get(&CONNECTOR)?
            .iter()
            .find(|p| p.name == name)?
            .id;
        self.values.borrow().get(&(CONNECTOR, id)).copied()
    }

    /// Property writes in issue order as (connector, property name, value)
    pub fn writes(&self) -> Vec<(u32, String, u64)> {
        self.writes.borrow().clone()
    }

    /// Commits in issue order as (crtc, connector, timing)
    pub fn commits(&self) -> Vec<(u32, u32, FakeTiming)> {
        self.commits.borrow().clone()
    }

    /// Writes and commits interleaved in issue order
    pub fn history(&self) -> Vec<FakeOp> {
        self.history.borrow().clone()
    }
}

fn prop(id: u32, name: &str) -> PropertyInfo {
    PropertyInfo {
        id,
        name: name.to_string(),
    }
}

impl KmsDevice for FakeDevice {
    type Timing = FakeTiming;

    fn crtcs(&self) -> io::Result<Vec<u32>> {
        Ok(self.crtcs.clone())
    }

    fn connector(&self, id: u32) -> Option<ConnectorInfo<FakeTiming>> {
        self.connectors.iter().find(|c| c.id == id).cloned()
    }

    fn encoder(&self, id: u32) -> Option<EncoderInfo> {
        self.encoders.iter().find(|e| e.id == id).copied()
    }

    fn connector_properties(&self, connector: u32) -> io::Result<Vec<PropertyInfo>> {
        Ok(self.properties.get(&connector).cloned().unwrap_or_default())
    }

    fn set_connector_property(&self, connector: u32, property: u32, value: u64) -> io::Result<()> {
        if self.fail_writes || !self.is_master.get() {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        let name = self
            .properties
            .get(&connector)
            .and_then(|props| props.iter().find(|p| p.id == property))
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.values.borrow_mut().insert((connector, property), value);
        self.history
            .borrow_mut()
            .push(FakeOp::Write(name.clone(), value));
        self.writes.borrow_mut().push((connector, name, value));
        Ok(())
    }

    fn set_crtc(&self, crtc: u32, connector: u32, timing: &FakeTiming) -> io::Result<()> {
        if self.fail_commit {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.commits.borrow_mut().push((crtc, connector, *timing));
        self.history.borrow_mut().push(FakeOp::Commit(crtc, *timing));
        Ok(())
    }

    fn acquire_master(&self) -> io::Result<()> {
        if !self.master_available.get() {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }
        self.is_master.set(true);
        Ok(())
    }

    fn release_master(&self) -> io::Result<()> {
        self.is_master.set(false);
        Ok(())
    }
}
