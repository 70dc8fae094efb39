//! Mock Instrument
//!
//! A simulated instrument implementing every capability a scan run needs. Nothing
//! is slow and nothing talks to hardware; every call is appended to a journal so
//! tests and the CLI can inspect exactly what a run would have done.
//!
//! Each `begin` also snapshots the current temperature and field into the list of
//! measured points, which is what most scan tests assert on.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::hardware::capabilities::{FieldControl, MagnetSwitch, RunControl, TemperatureControl};
use crate::scan::magnet::MagnetDevice;

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentCall {
    SetTemperature { value: f64, wait: bool },
    SetField { value: f64, wait: bool },
    SelectDevice(MagnetDevice),
    Begin,
    WaitForMevents(f64),
    End,
}

impl InstrumentCall {
    /// Operation name, as used by [`MockInstrument::fail_on`].
    pub fn operation(&self) -> &'static str {
        match self {
            InstrumentCall::SetTemperature { .. } => "set_temperature",
            InstrumentCall::SetField { .. } => "set_field",
            InstrumentCall::SelectDevice(_) => "select_device",
            InstrumentCall::Begin => "begin",
            InstrumentCall::WaitForMevents(_) => "wait_for_mevents",
            InstrumentCall::End => "end",
        }
    }
}

impl fmt::Display for InstrumentCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentCall::SetTemperature { value, wait } => {
                write!(f, "set_temperature({value}, wait={wait})")
            }
            InstrumentCall::SetField { value, wait } => write!(f, "set_field({value}, wait={wait})"),
            InstrumentCall::SelectDevice(device) => write!(f, "select_device({device})"),
            InstrumentCall::Begin => f.write_str("begin()"),
            InstrumentCall::WaitForMevents(mevents) => write!(f, "wait_for_mevents({mevents})"),
            InstrumentCall::End => f.write_str("end()"),
        }
    }
}

/// Temperature and field in effect when a measurement began. `None` means never set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasuredPoint {
    pub temperature: Option<f64>,
    pub field: Option<f64>,
    /// Magnet active at `begin`.
    pub magnet: MagnetDevice,
}

#[derive(Debug)]
struct MockState {
    temperature: Option<f64>,
    field: Option<f64>,
    selected: MagnetDevice,
    journal: Vec<InstrumentCall>,
    measured: Vec<MeasuredPoint>,
    fail_on: Option<&'static str>,
}

/// Recording mock implementing every instrument capability.
///
/// # Example
///
/// ```rust,ignore
/// let instrument = Arc::new(MockInstrument::with_selected(MagnetDevice::Danfysik));
/// instrument.set_field(10.0, true).await?;
/// assert_eq!(instrument.journal().await.len(), 1);
/// ```
pub struct MockInstrument {
    state: Arc<RwLock<MockState>>,
    call_latency: Duration,
}

impl MockInstrument {
    /// New mock with the zero-field magnet active and nothing set.
    pub fn new() -> Self {
        Self::with_selected(MagnetDevice::ActiveZF)
    }

    /// New mock with `device` reported as the active magnet.
    pub fn with_selected(device: MagnetDevice) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                temperature: None,
                field: None,
                selected: device,
                journal: Vec::new(),
                measured: Vec::new(),
                fail_on: None,
            })),
            call_latency: Duration::ZERO,
        }
    }

    /// Sleep this long in every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.call_latency = latency;
        self
    }

    /// Make every call to `operation` (e.g. `"set_field"`) fail.
    pub async fn fail_on(&self, operation: &'static str) {
        self.state.write().await.fail_on = Some(operation);
    }

    /// Every call made so far, oldest first.
    pub async fn journal(&self) -> Vec<InstrumentCall> {
        self.state.read().await.journal.clone()
    }

    /// One entry per `begin`.
    pub async fn measured_points(&self) -> Vec<MeasuredPoint> {
        self.state.read().await.measured.clone()
    }

    /// Currently active magnet.
    pub async fn selected(&self) -> MagnetDevice {
        self.state.read().await.selected
    }

    /// Last temperature set, if any.
    pub async fn temperature(&self) -> Option<f64> {
        self.state.read().await.temperature
    }

    /// Last field set, if any.
    pub async fn field(&self) -> Option<f64> {
        self.state.read().await.field
    }

    async fn record(&self, call: InstrumentCall) -> Result<()> {
        if !self.call_latency.is_zero() {
            sleep(self.call_latency).await;
        }
        let mut state = self.state.write().await;
        if state.fail_on == Some(call.operation()) {
            return Err(anyhow!("MockInstrument: simulated failure in {}", call.operation()));
        }
        debug!(call = %call, "MockInstrument call");
        match &call {
            InstrumentCall::SetTemperature { value, .. } => state.temperature = Some(*value),
            InstrumentCall::SetField { value, .. } => state.field = Some(*value),
            InstrumentCall::SelectDevice(device) => state.selected = *device,
            InstrumentCall::Begin => {
                let point = MeasuredPoint {
                    temperature: state.temperature,
                    field: state.field,
                    magnet: state.selected,
                };
                state.measured.push(point);
            }
            InstrumentCall::WaitForMevents(_) | InstrumentCall::End => {}
        }
        state.journal.push(call);
        Ok(())
    }
}

impl Default for MockInstrument {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemperatureControl for MockInstrument {
    async fn set_temperature(&self, value: f64, wait: bool) -> Result<()> {
        self.record(InstrumentCall::SetTemperature { value, wait }).await
    }
}

#[async_trait]
impl FieldControl for MockInstrument {
    async fn set_field(&self, value: f64, wait: bool) -> Result<()> {
        self.record(InstrumentCall::SetField { value, wait }).await
    }
}

#[async_trait]
impl MagnetSwitch for MockInstrument {
    async fn select_device(&self, device: MagnetDevice) -> Result<()> {
        if !device.is_activatable() {
            return Err(anyhow!("MockInstrument: {device} cannot be activated"));
        }
        self.record(InstrumentCall::SelectDevice(device)).await
    }

    async fn selected_device(&self) -> Result<MagnetDevice> {
        Ok(self.state.read().await.selected)
    }
}

#[async_trait]
impl RunControl for MockInstrument {
    async fn begin(&self) -> Result<()> {
        self.record(InstrumentCall::Begin).await
    }

    async fn wait_for_mevents(&self, mevents: f64) -> Result<()> {
        self.record(InstrumentCall::WaitForMevents(mevents)).await
    }

    async fn end(&self) -> Result<()> {
        self.record(InstrumentCall::End).await
    }
}
