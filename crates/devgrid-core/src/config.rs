//! devgrid.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{Device, DeviceType};

/// Default slot mailbox depth.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Default API listen port.
pub const DEFAULT_API_PORT: u16 = 8090;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevgridConfig {
    pub agent: AgentSection,
    pub api: Option<ApiConfig>,
    pub slots: Option<SlotDefaults>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub id: String,
    pub mailbox_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: Option<u16>,
}

/// Initial enablement flags applied to every slot at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefaults {
    #[serde(default = "enabled_by_default")]
    pub agent_enabled: bool,
    #[serde(default = "enabled_by_default")]
    pub user_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for SlotDefaults {
    fn default() -> Self {
        Self {
            agent_enabled: true,
            user_enabled: true,
        }
    }
}

impl DevgridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: DevgridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configs that would produce colliding device identifiers.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent.id.trim().is_empty() {
            anyhow::bail!("agent.id must not be empty");
        }
        if self.agent.mailbox_capacity == Some(0) {
            anyhow::bail!("agent.mailbox_capacity must be at least 1");
        }
        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id) {
                anyhow::bail!("duplicate device id {}", device.id);
            }
        }
        Ok(())
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.agent
            .mailbox_capacity
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn api_port(&self) -> u16 {
        self.api
            .as_ref()
            .and_then(|a| a.port)
            .unwrap_or(DEFAULT_API_PORT)
    }

    pub fn slot_defaults(&self) -> SlotDefaults {
        self.slots.unwrap_or_default()
    }

    /// Scaffold a config for an agent with `gpus` GPU devices.
    pub fn scaffold(agent_id: &str, gpus: u32) -> Self {
        let devices = (0..gpus)
            .map(|id| Device {
                id,
                brand: "unknown".to_string(),
                uuid: format!("GPU-{agent_id}-{id}"),
                kind: DeviceType::Gpu,
            })
            .collect();

        DevgridConfig {
            agent: AgentSection {
                id: agent_id.to_string(),
                mailbox_capacity: Some(DEFAULT_MAILBOX_CAPACITY),
            },
            api: Some(ApiConfig {
                port: Some(DEFAULT_API_PORT),
            }),
            slots: Some(SlotDefaults::default()),
            devices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_round_trips_through_toml() {
        let config = DevgridConfig::scaffold("agent-7", 2);
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("agent-7"));

        let parsed = DevgridConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.devices.len(), 2);
        assert_eq!(parsed.devices[1].kind, DeviceType::Gpu);
    }

    #[test]
    fn test_parse_minimal_uses_defaults() {
        let toml_str = r#"
[agent]
id = "agent-1"
"#;
        let config = DevgridConfig::from_toml_str(toml_str).unwrap();
        assert!(config.devices.is_empty());
        assert_eq!(config.mailbox_capacity(), DEFAULT_MAILBOX_CAPACITY);
        assert_eq!(config.api_port(), DEFAULT_API_PORT);
        assert_eq!(config.slot_defaults(), SlotDefaults::default());
    }

    #[test]
    fn test_parse_devices_and_slot_defaults() {
        let toml_str = r#"
[agent]
id = "agent-1"

[slots]
user_enabled = false

[[devices]]
id = 0
brand = "Intel Xeon"
uuid = "cpu-0"
type = "cpu"
"#;
        let config = DevgridConfig::from_toml_str(toml_str).unwrap();
        let defaults = config.slot_defaults();
        assert!(defaults.agent_enabled);
        assert!(!defaults.user_enabled);
        assert_eq!(config.devices[0].kind, DeviceType::Cpu);
    }

    #[test]
    fn test_rejects_duplicate_device_ids() {
        let toml_str = r#"
[agent]
id = "agent-1"

[[devices]]
id = 0
brand = "a"
uuid = "a"
type = "gpu"

[[devices]]
id = 0
brand = "b"
uuid = "b"
type = "gpu"
"#;
        let err = DevgridConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("duplicate device id 0"));
    }

    #[test]
    fn test_rejects_empty_agent_id() {
        let toml_str = r#"
[agent]
id = "  "
"#;
        assert!(DevgridConfig::from_toml_str(toml_str).is_err());
    }
}
