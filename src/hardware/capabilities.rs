//! Instrument Capabilities
//!
//! Fine-grained capability traits for the collaborators a scan run drives. The engine
//! never talks to a device protocol directly; it is handed implementations of these
//! traits and awaits each call to completion before issuing the next.
//!
//! - A cryostat implements: `TemperatureControl`
//! - A magnet power supply implements: `FieldControl`
//! - The magnet switchboard implements: `MagnetSwitch`
//! - The data-acquisition electronics implement: `RunControl`
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! # Example
//!
//! ```rust,ignore
//! struct Cryostat {
//!     setpoint: RwLock<f64>,
//! }
//!
//! #[async_trait]
//! impl TemperatureControl for Cryostat {
//!     async fn set_temperature(&self, kelvin: f64, wait: bool) -> Result<()> {
//!         *self.setpoint.write().await = kelvin;
//!         if wait {
//!             self.wait_stable().await?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::scan::magnet::MagnetDevice;

/// Capability: Temperature Control
///
/// # Contract
/// - `value` is the sample temperature set-point in kelvin
/// - With `wait == true` the call returns only once the set-point is reached
#[async_trait]
pub trait TemperatureControl: Send + Sync {
    /// Set the sample temperature.
    async fn set_temperature(&self, value: f64, wait: bool) -> Result<()>;
}

/// Capability: Field Control
///
/// # Contract
/// - `value` is the field set-point in gauss, applied through the active magnet
/// - With `wait == true` the call returns only once the field is stable
#[async_trait]
pub trait FieldControl: Send + Sync {
    /// Set the magnetic field on the active magnet.
    async fn set_field(&self, value: f64, wait: bool) -> Result<()>;
}

/// Capability: Magnet Switching
///
/// Which magnet is active is instrument-wide state. Only
/// [`MagnetSelector`](crate::scan::magnet::MagnetSelector) should call into this.
#[async_trait]
pub trait MagnetSwitch: Send + Sync {
    /// Activate `device`. Never called with [`MagnetDevice::NotApplicable`].
    async fn select_device(&self, device: MagnetDevice) -> Result<()>;

    /// Currently active magnet.
    async fn selected_device(&self) -> Result<MagnetDevice>;
}

/// Capability: Run Control
///
/// A measurement is the bracket `begin`, `wait_for_mevents`, `end`.
#[async_trait]
pub trait RunControl: Send + Sync {
    /// Start collecting data.
    async fn begin(&self) -> Result<()>;

    /// Block until `mevents` million events have been counted.
    async fn wait_for_mevents(&self, mevents: f64) -> Result<()>;

    /// Stop collecting data.
    async fn end(&self) -> Result<()>;
}

/// Everything a scan run needs, as one bundle of trait objects.
///
/// The four capabilities are usually separate devices. Tests often hand the same
/// mock instrument in for all of them.
#[derive(Clone)]
pub struct Instruments {
    /// Cryostat.
    pub temperature: Arc<dyn TemperatureControl>,
    /// Active magnet power supply.
    pub field: Arc<dyn FieldControl>,
    /// Magnet switchboard.
    pub magnet: Arc<dyn MagnetSwitch>,
    /// Data acquisition.
    pub run: Arc<dyn RunControl>,
}

impl Instruments {
    /// Use one object for every capability.
    pub fn from_single<T>(instrument: Arc<T>) -> Self
    where
        T: TemperatureControl + FieldControl + MagnetSwitch + RunControl + 'static,
    {
        Self {
            temperature: instrument.clone(),
            field: instrument.clone(),
            magnet: instrument.clone(),
            run: instrument,
        }
    }
}
