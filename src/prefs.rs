use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The materials that give blocks a meaning to the scanner and the
/// reconciliation pass. Hosts usually load these once from a JSON config
/// and keep them for the registry's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Body material marking "still part of this chip's run".
    #[serde(default = "default_chip_block")]
    pub chip_block: SmolStr,
    #[serde(default = "default_input_block")]
    pub input_block: SmolStr,
    #[serde(default = "default_output_block")]
    pub output_block: SmolStr,
    #[serde(default = "default_interface_block")]
    pub interface_block: SmolStr,
    /// Marker the player interacts with to activate a chip.
    #[serde(default = "default_activation_block")]
    pub activation_block: SmolStr,
    /// Medium an output pin must drive.
    #[serde(default = "default_transmission_block")]
    pub transmission_block: SmolStr,
}

fn default_chip_block() -> SmolStr {
    SmolStr::new("minecraft:sandstone")
}
fn default_input_block() -> SmolStr {
    SmolStr::new("minecraft:iron_block")
}
fn default_output_block() -> SmolStr {
    SmolStr::new("minecraft:gold_block")
}
fn default_interface_block() -> SmolStr {
    SmolStr::new("minecraft:lapis_block")
}
fn default_activation_block() -> SmolStr {
    SmolStr::new("minecraft:oak_wall_sign")
}
fn default_transmission_block() -> SmolStr {
    SmolStr::new("minecraft:redstone_wire")
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            chip_block: default_chip_block(),
            input_block: default_input_block(),
            output_block: default_output_block(),
            interface_block: default_interface_block(),
            activation_block: default_activation_block(),
            transmission_block: default_transmission_block(),
        }
    }
}

impl Preferences {
    /// Parse preferences from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
