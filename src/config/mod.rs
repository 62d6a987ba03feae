//! Project configuration: `ksc.toml`, volume selection and scaffolding.

pub mod project;
pub mod scaffold;

use std::fmt;
use std::str::FromStr;

pub use project::{Project, VolumeConfig, CONFIG_FILE};

/// Which configured volumes an operation targets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selector {
    #[default]
    All,
    Index(u32),
    Name(String),
}

impl Selector {
    pub fn matches(&self, volume: &VolumeConfig) -> bool {
        match self {
            Selector::All => true,
            Selector::Index(index) => volume.index == *index,
            Selector::Name(name) => volume.name == *name,
        }
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Selector::All);
        }
        Ok(match s.parse::<u32>() {
            Ok(index) => Selector::Index(index),
            Err(_) => Selector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Index(index) => write!(f, "{}", index),
            Selector::Name(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        assert_eq!("all".parse::<Selector>().unwrap(), Selector::All);
        assert_eq!("ALL".parse::<Selector>().unwrap(), Selector::All);
        assert_eq!("1".parse::<Selector>().unwrap(), Selector::Index(1));
        assert_eq!(
            "boot".parse::<Selector>().unwrap(),
            Selector::Name("boot".to_string())
        );
        assert_eq!(Selector::Index(2).to_string(), "2");
    }
}
