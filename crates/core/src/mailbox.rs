//! Pending device commands.
//!
//! A device has at most one pending command. It is repeated in every
//! heartbeat response until a heartbeat confirms the command took effect, so
//! a response the device failed to read does not lose it.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;
use crate::fault::FaultCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    /// Clear the latched fault after an operator resolved the incident.
    Reset,
}

impl DeviceCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceCommand::Reset => "reset",
        }
    }

    /// Whether a heartbeat reporting `reported` confirms the command.
    pub fn is_acknowledged_by(self, reported: FaultCode) -> bool {
        match self {
            DeviceCommand::Reset => reported.is_normal(),
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reset" => Ok(DeviceCommand::Reset),
            other => Err(CoreError::Validation(format!("Unknown device command: {other}"))),
        }
    }
}

/// Single-slot mailbox for one device.
#[derive(Debug, Clone, Default)]
pub struct CommandSlot {
    pending: Option<DeviceCommand>,
}

impl CommandSlot {
    /// Replace any pending command.
    pub fn set(&mut self, command: DeviceCommand) {
        self.pending = Some(command);
    }

    pub fn pending(&self) -> Option<DeviceCommand> {
        self.pending
    }

    /// Command to include in the response to a heartbeat reporting
    /// `reported`. The command is still returned on the heartbeat that
    /// acknowledges it, and cleared afterwards.
    pub fn deliver(&mut self, reported: FaultCode) -> Option<DeviceCommand> {
        let command = self.pending?;
        if command.is_acknowledged_by(reported) {
            self.pending = None;
        }
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_delivers_nothing() {
        let mut slot = CommandSlot::default();
        assert_eq!(slot.deliver(FaultCode::Normal), None);
    }

    #[test]
    fn reset_survives_faulty_heartbeats() {
        let mut slot = CommandSlot::default();
        slot.set(DeviceCommand::Reset);
        // Responses to these heartbeats may all be lost in transit.
        for _ in 0..50 {
            assert_eq!(slot.deliver(FaultCode::F2), Some(DeviceCommand::Reset));
        }
        assert_eq!(slot.pending(), Some(DeviceCommand::Reset));
    }

    #[test]
    fn reset_cleared_after_normal_heartbeat() {
        let mut slot = CommandSlot::default();
        slot.set(DeviceCommand::Reset);
        assert_eq!(slot.deliver(FaultCode::Normal), Some(DeviceCommand::Reset));
        assert_eq!(slot.deliver(FaultCode::Normal), None);
        assert_eq!(slot.pending(), None);
    }

    #[test]
    fn parses_command_tokens() {
        assert_eq!("reset".parse::<DeviceCommand>().unwrap(), DeviceCommand::Reset);
        assert!("reboot".parse::<DeviceCommand>().is_err());
        assert_eq!(serde_json::to_value(DeviceCommand::Reset).unwrap(), "reset");
    }
}
