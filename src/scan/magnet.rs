//! Magnet device selection.
//!
//! The instrument has three magnets that can source a field at the sample. Only one is
//! active at a time, and which one is active is instrument-wide state. That state is
//! reached exclusively through a [`MagnetSelector`], which owns the switch collaborator
//! for the duration of a run and remembers which device the operator asked for so a
//! transient zero-field switch can be undone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppResult, SequencerError};
use crate::hardware::capabilities::MagnetSwitch;

/// Short codes accepted from the operator, in display order.
pub const DEVICE_CODES: [&str; 3] = ["ZF", "LF", "TF"];

/// Magnet device requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagnetDevice {
    /// Active zero-field compensation. The only device allowed to hold a zero field.
    ActiveZF,
    /// Longitudinal field power supply.
    Danfysik,
    /// Transverse field coils.
    T20Coils,
    /// No magnet. Only meaningful when the field is kept.
    NotApplicable,
}

impl MagnetDevice {
    /// Devices that can actually be activated.
    pub const ACTIVATABLE: [MagnetDevice; 3] = [
        MagnetDevice::ActiveZF,
        MagnetDevice::Danfysik,
        MagnetDevice::T20Coils,
    ];

    /// Instrument name of the device, as reported by the selected-magnet query.
    pub fn name(self) -> &'static str {
        match self {
            MagnetDevice::ActiveZF => "Active ZF",
            MagnetDevice::Danfysik => "Danfysik",
            MagnetDevice::T20Coils => "T20 Coils",
            MagnetDevice::NotApplicable => "N/A",
        }
    }

    /// Operator short code.
    pub fn code(self) -> &'static str {
        match self {
            MagnetDevice::ActiveZF => "ZF",
            MagnetDevice::Danfysik => "LF",
            MagnetDevice::T20Coils => "TF",
            MagnetDevice::NotApplicable => "N/A",
        }
    }

    /// Anything but `N/A` can be switched to.
    pub fn is_activatable(self) -> bool {
        self != MagnetDevice::NotApplicable
    }

    /// Resolve an instrument name (`"Danfysik"`) back to a device.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ACTIVATABLE
            .into_iter()
            .chain([MagnetDevice::NotApplicable])
            .find(|device| device.name() == name)
    }
}

impl fmt::Display for MagnetDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `['ZF', 'LF', 'TF']`, as quoted in operator messages.
pub fn device_code_list() -> String {
    let quoted: Vec<String> = DEVICE_CODES.iter().map(|c| format!("'{c}'")).collect();
    format!("[{}]", quoted.join(", "))
}

impl FromStr for MagnetDevice {
    type Err = SequencerError;

    /// Case-insensitive short code: `ZF`, `LF`, `TF` or `N/A`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_uppercase().as_str() {
            "ZF" => Ok(MagnetDevice::ActiveZF),
            "LF" => Ok(MagnetDevice::Danfysik),
            "TF" => Ok(MagnetDevice::T20Coils),
            "N/A" => Ok(MagnetDevice::NotApplicable),
            _ => Err(SequencerError::input_format(
                "magnet_device",
                raw,
                format!("Magnet device must be one of {} or N/A", device_code_list()),
            )),
        }
    }
}

/// The activation command needed to go from `current` to `requested`, if any.
pub fn activation_for(requested: MagnetDevice, current: MagnetDevice) -> Option<MagnetDevice> {
    (requested != current).then_some(requested)
}

/// Outcome of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The device was already active.
    Unchanged,
    /// An activation command was sent.
    Switched { from: MagnetDevice, to: MagnetDevice },
}

/// Single owner of the instrument's "selected magnet" state for one run.
pub struct MagnetSelector {
    switch: Arc<dyn MagnetSwitch>,
    requested: Option<MagnetDevice>,
    zero_field_engaged: bool,
}

impl MagnetSelector {
    /// Selector over `switch` with nothing requested yet.
    pub fn new(switch: Arc<dyn MagnetSwitch>) -> Self {
        Self {
            switch,
            requested: None,
            zero_field_engaged: false,
        }
    }

    /// Device the operator asked for, once [`select`](Self::select) has run.
    pub fn requested(&self) -> Option<MagnetDevice> {
        self.requested
    }

    /// Whether a transient zero-field switch is currently in effect.
    pub fn zero_field_engaged(&self) -> bool {
        self.zero_field_engaged
    }

    async fn activate(&self, device: MagnetDevice) -> AppResult<Selection> {
        if !device.is_activatable() {
            return Err(SequencerError::Instrument(format!(
                "no activation command for magnet device {device}"
            )));
        }
        let current = self
            .switch
            .selected_device()
            .await
            .map_err(|e| SequencerError::instrument("query_selected_device", e))?;

        match activation_for(device, current) {
            None => {
                debug!(device = %device, "Magnet already selected");
                Ok(Selection::Unchanged)
            }
            Some(target) => {
                self.switch
                    .select_device(target)
                    .await
                    .map_err(|e| SequencerError::instrument("select_device", e))?;
                info!(from = %current, to = %target, "Magnet device selected");
                Ok(Selection::Switched {
                    from: current,
                    to: target,
                })
            }
        }
    }

    /// Make `requested` the active device for this run.
    ///
    /// Called once per run, before any field set-point is applied.
    pub async fn select(&mut self, requested: MagnetDevice) -> AppResult<Selection> {
        let selection = self.activate(requested).await?;
        self.requested = Some(requested);
        self.zero_field_engaged = false;
        Ok(selection)
    }

    /// Transiently switch to active zero-field without forgetting the requested device.
    pub async fn engage_zero_field(&mut self) -> AppResult<Selection> {
        let selection = self.activate(MagnetDevice::ActiveZF).await?;
        self.zero_field_engaged = true;
        Ok(selection)
    }

    /// Undo [`engage_zero_field`](Self::engage_zero_field). No-op if nothing is engaged.
    pub async fn restore(&mut self) -> AppResult<Selection> {
        if !self.zero_field_engaged {
            return Ok(Selection::Unchanged);
        }
        let Some(requested) = self.requested else {
            self.zero_field_engaged = false;
            return Ok(Selection::Unchanged);
        };
        let selection = self.activate(requested).await?;
        self.zero_field_engaged = false;
        Ok(selection)
    }
}
