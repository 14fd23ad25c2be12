use serde::{Deserialize, Serialize};

/// The gateway layer that produced a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialLayer {
    None,
    System,
    Tenant,
    Partnership,
    User,
}

impl DenialLayer {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialLayer::None => "none",
            DenialLayer::System => "system",
            DenialLayer::Tenant => "tenant",
            DenialLayer::Partnership => "partnership",
            DenialLayer::User => "user",
        }
    }
}

impl core::fmt::Display for DenialLayer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a gateway check. A denial is an ordinary value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub denied_at_layer: DenialLayer,
    pub reason: String,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            denied_at_layer: DenialLayer::None,
            reason: "all federation layers passed".to_string(),
        }
    }

    pub fn deny(layer: DenialLayer, reason: impl Into<String>) -> Self {
        debug_assert!(layer != DenialLayer::None);
        Self {
            allowed: false,
            denied_at_layer: layer,
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_has_no_layer() {
        let v = Verdict::allow();
        assert!(v.is_allowed());
        assert_eq!(v.denied_at_layer, DenialLayer::None);
    }

    #[test]
    fn layers_serialize_as_snake_case() {
        let v = Verdict::deny(DenialLayer::Partnership, "no partnership");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["denied_at_layer"], "partnership");
        assert_eq!(json["allowed"], false);
    }
}
