use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A block kind plus its property list, the vocabulary the scanner and the
/// reconciliation pass speak when talking to the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub name: SmolStr,
    pub properties: Vec<(SmolStr, SmolStr)>,
}

impl BlockState {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        BlockState {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.properties.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.properties.push((key, value));
        }
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Material check by name, ignoring properties.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn is_air(&self) -> bool {
        self.name == "minecraft:air"
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[")?;
            for (i, (key, value)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BlockState;

    #[test]
    fn test_material_check() {
        let block = BlockState::new("minecraft:iron_block");
        assert!(block.is("minecraft:iron_block"));
        assert!(!block.is("minecraft:gold_block"));
        assert!(!block.is_air());
        assert!(BlockState::new("minecraft:air").is_air());
    }

    #[test]
    fn test_with_property_replaces_existing() {
        let block = BlockState::new("minecraft:redstone_wire")
            .with_property("power", "0")
            .with_property("power", "15");
        assert_eq!(block.property("power"), Some("15"));
        assert_eq!(block.properties.len(), 1);
        assert_eq!(block.to_string(), "minecraft:redstone_wire[power=15]");
    }
}
