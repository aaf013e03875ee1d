//! Fault knowledge lookup.
//!
//! Resolves a fault code to a human-readable name and the diagnosis text
//! attached to new incidents. The built-in table covers the five known
//! faults; deployments with a richer knowledge base implement
//! [`FaultKnowledge`] themselves.

use crate::fault::FaultCode;
use crate::types::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInfo {
    /// Display name, also stored as the incident's fault type.
    pub name: String,
    pub root_cause: String,
    pub solution: String,
}

pub trait FaultKnowledge: Send + Sync {
    /// `None` for codes without an entry (including `Normal`).
    fn lookup(&self, code: FaultCode) -> Option<FaultInfo>;

    /// Recommendation text for a new incident.
    fn recommendation(&self, code: FaultCode, generated_at: Timestamp) -> Option<String> {
        self.lookup(code).map(|info| render_report(&info, generated_at))
    }
}

/// Render the standard diagnosis block.
pub fn render_report(info: &FaultInfo, generated_at: Timestamp) -> String {
    format!(
        "【AI 诊断】\n故障类型：{}\n根本原因：{}\n建议方案：{}\n生成时间：{}\n",
        info.name,
        info.root_cause,
        info.solution,
        generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Built-in knowledge table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticFaultKnowledge;

impl FaultKnowledge for StaticFaultKnowledge {
    fn lookup(&self, code: FaultCode) -> Option<FaultInfo> {
        let (name, root_cause, solution) = match code {
            FaultCode::Normal => return None,
            FaultCode::F1 => (
                "交流窜入 (AC Intrusion)",
                "整流二极管击穿",
                "更换整流桥臂，检查滤波电容",
            ),
            FaultCode::F2 => (
                "绝缘故障 (Insulation Fault)",
                "对地绝缘电阻下降",
                "使用电桥法定位接地点",
            ),
            FaultCode::F3 => (
                "电容老化 (Capacitor Aging)",
                "ESR值升高",
                "更换同批次电容组",
            ),
            FaultCode::F4 => (
                "IGBT开路 (IGBT Open Circuit)",
                "栅极驱动失效或键合线断裂",
                "检测驱动板波形",
            ),
            FaultCode::F5 => (
                "接地故障 (Grounding Fault)",
                "金属性接地",
                "立即停机排查",
            ),
        };
        Some(FaultInfo {
            name: name.to_string(),
            root_cause: root_cause.to_string(),
            solution: solution.to_string(),
        })
    }
}

/// Whether an existing incident's fault type refers to `expected_name`.
/// Older rows may carry a longer label that contains the name.
pub fn fault_type_matches(recorded: Option<&str>, expected_name: &str) -> bool {
    recorded.is_some_and(|r| r == expected_name || r.contains(expected_name))
}

/// Recover the fault code from an incident's fault type, for rows that
/// only carry the display name. Unrecognized names map to `Normal`.
pub fn infer_fault_code(fault_type: Option<&str>) -> FaultCode {
    let Some(name) = fault_type else {
        return FaultCode::Normal;
    };
    if name.contains("交流窜入") {
        FaultCode::F1
    } else if name.contains("绝缘故障") {
        FaultCode::F2
    } else if name.contains("电容") {
        FaultCode::F3
    } else if name.contains("IGBT") || name.contains("开路") {
        FaultCode::F4
    } else if name.contains("接地") {
        FaultCode::F5
    } else {
        FaultCode::Normal
    }
}
