//! Fault codes and the per-device fault transition function.
//!
//! Devices report one of six wire codes (`E00`..`E05`). `E00` is the healthy
//! state; every other code names exactly one active fault. Anything that does
//! not parse is treated as healthy.

use std::fmt;

use serde::{Serialize, Serializer};

/// Wire code reported by a healthy device.
pub const NORMAL_WIRE_CODE: &str = "E00";

/// Closed set of fault states a device can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaultCode {
    #[default]
    Normal,
    /// `E01`: AC intrusion on the DC bus.
    F1,
    /// `E02`: insulation fault.
    F2,
    /// `E03`: DC capacitor aging.
    F3,
    /// `E04`: IGBT open circuit.
    F4,
    /// `E05`: DC bus grounding.
    F5,
}

impl FaultCode {
    /// All fault codes other than [`FaultCode::Normal`].
    pub const FAULTS: [FaultCode; 5] = [
        FaultCode::F1,
        FaultCode::F2,
        FaultCode::F3,
        FaultCode::F4,
        FaultCode::F5,
    ];

    /// Parse a wire code. Surrounding whitespace is ignored; unknown or empty
    /// codes map to `Normal`.
    pub fn from_wire(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "E01" => FaultCode::F1,
            "E02" => FaultCode::F2,
            "E03" => FaultCode::F3,
            "E04" => FaultCode::F4,
            "E05" => FaultCode::F5,
            _ => FaultCode::Normal,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            FaultCode::Normal => NORMAL_WIRE_CODE,
            FaultCode::F1 => "E01",
            FaultCode::F2 => "E02",
            FaultCode::F3 => "E03",
            FaultCode::F4 => "E04",
            FaultCode::F5 => "E05",
        }
    }

    /// Machine identifier of the fault, `None` for `Normal`.
    pub fn machine_name(self) -> Option<&'static str> {
        match self {
            FaultCode::Normal => None,
            FaultCode::F1 => Some("AC_INTRUSION"),
            FaultCode::F2 => Some("INSULATION_FAULT"),
            FaultCode::F3 => Some("DC_CAPACITOR_AGING"),
            FaultCode::F4 => Some("IGBT_OPEN_CIRCUIT"),
            FaultCode::F5 => Some("DC_BUS_GROUNDING"),
        }
    }

    pub fn is_normal(self) -> bool {
        self == FaultCode::Normal
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for FaultCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// Transition classification
// ---------------------------------------------------------------------------

/// Outcome of comparing the previous and current fault code of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to record. Also covers a direct change from one fault to
    /// another, which overwrites the state without an event.
    NoOp,
    /// The device entered a fault from the healthy state.
    Onset(FaultCode),
    /// The device returned to healthy; carries the fault it left.
    Recovery(FaultCode),
}

/// Classify a fault-code change.
///
/// `Onset` iff `prev` is normal and `curr` is not; `Recovery` iff `prev` is a
/// fault and `curr` is normal; `NoOp` otherwise.
pub fn classify(prev: FaultCode, curr: FaultCode) -> Transition {
    match (prev.is_normal(), curr.is_normal()) {
        (true, false) => Transition::Onset(curr),
        (false, true) => Transition::Recovery(prev),
        _ => Transition::NoOp,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_known_wire_codes() {
        assert_eq!(FaultCode::from_wire("E00"), FaultCode::Normal);
        assert_eq!(FaultCode::from_wire("E01"), FaultCode::F1);
        assert_eq!(FaultCode::from_wire(" e05 "), FaultCode::F5);
    }

    #[test]
    fn unknown_codes_map_to_normal() {
        assert_eq!(FaultCode::from_wire("E99"), FaultCode::Normal);
        assert_eq!(FaultCode::from_wire(""), FaultCode::Normal);
        assert_eq!(FaultCode::from_wire("fault"), FaultCode::Normal);
    }

    #[test]
    fn wire_code_survives_display_and_serde() {
        for code in FaultCode::FAULTS {
            assert_eq!(FaultCode::from_wire(&code.to_string()), code);
        }
        assert_eq!(serde_json::to_value(FaultCode::F3).unwrap(), "E03");
    }

    #[test]
    fn normal_has_no_machine_name() {
        assert!(FaultCode::Normal.machine_name().is_none());
        assert_eq!(FaultCode::F4.machine_name(), Some("IGBT_OPEN_CIRCUIT"));
    }

    #[test]
    fn normal_to_fault_is_onset() {
        assert_matches!(
            classify(FaultCode::Normal, FaultCode::F2),
            Transition::Onset(FaultCode::F2)
        );
    }

    #[test]
    fn fault_to_normal_is_recovery_of_previous() {
        assert_matches!(
            classify(FaultCode::F3, FaultCode::Normal),
            Transition::Recovery(FaultCode::F3)
        );
    }

    #[test]
    fn steady_states_are_noop() {
        assert_eq!(classify(FaultCode::Normal, FaultCode::Normal), Transition::NoOp);
        assert_eq!(classify(FaultCode::F1, FaultCode::F1), Transition::NoOp);
    }

    #[test]
    fn fault_to_other_fault_is_noop() {
        assert_eq!(classify(FaultCode::F1, FaultCode::F5), Transition::NoOp);
    }
}
