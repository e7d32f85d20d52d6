//! Layout-only metadata attached to entities and notes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Z-order assigned to items that have no visual info
pub const DEFAULT_Z_ORDER: i32 = 0;

/// Position and size in diagram coordinates.
///
/// A zero width or height means "use the preferred size".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn at(x: i32, y: i32) -> Self {
        Self::new(x, y, 0, 0)
    }

    pub fn has_size(&self) -> bool {
        self.width != 0 || self.height != 0
    }
}

/// RGB color, persisted as `r,g,b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("invalid color '{}': expected r,g,b", s));
        }
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|_| format!("invalid color channel '{}' in '{}'", v, s))
        };
        Ok(Color::rgb(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
        ))
    }
}

/// Which attributes an entity shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeVisibility {
    /// Every column
    #[default]
    All,
    /// Primary-key and foreign-key columns
    Keys,
    /// Primary-key columns only
    Primary,
    /// No columns
    None,
}

impl AttributeVisibility {
    /// Whether a column with the given key flags is shown
    pub fn shows(self, in_primary_key: bool, in_foreign_key: bool) -> bool {
        match self {
            AttributeVisibility::All => true,
            AttributeVisibility::Keys => in_primary_key || in_foreign_key,
            AttributeVisibility::Primary => in_primary_key,
            AttributeVisibility::None => false,
        }
    }
}

impl FromStr for AttributeVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(AttributeVisibility::All),
            "keys" => Ok(AttributeVisibility::Keys),
            "primary" => Ok(AttributeVisibility::Primary),
            "none" => Ok(AttributeVisibility::None),
            _ => Err(format!(
                "Unknown attribute visibility: {}. Valid options: all, keys, primary, none",
                s
            )),
        }
    }
}

impl fmt::Display for AttributeVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeVisibility::All => write!(f, "all"),
            AttributeVisibility::Keys => write!(f, "keys"),
            AttributeVisibility::Primary => write!(f, "primary"),
            AttributeVisibility::None => write!(f, "none"),
        }
    }
}

/// Visual state of an entity or note.
///
/// `bounds == None` marks the item for auto layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualInfo {
    pub bounds: Option<Rect>,
    pub background: Option<Color>,
    pub foreground: Option<Color>,
    pub z_order: i32,
    pub attribute_visibility: Option<AttributeVisibility>,
}

impl Default for VisualInfo {
    fn default() -> Self {
        Self {
            bounds: None,
            background: None,
            foreground: None,
            z_order: DEFAULT_Z_ORDER,
            attribute_visibility: None,
        }
    }
}

impl VisualInfo {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            bounds: Some(Rect::at(x, y)),
            ..Self::default()
        }
    }

    pub fn needs_layout(&self) -> bool {
        self.bounds.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_and_display() {
        let color: Color = "255, 128,0".parse().unwrap();
        assert_eq!(color, Color::rgb(255, 128, 0));
        assert_eq!(color.to_string(), "255,128,0");
        assert!("1,2".parse::<Color>().is_err());
        assert!("1,2,300".parse::<Color>().is_err());
    }

    #[test]
    fn test_attribute_visibility_shows() {
        assert!(AttributeVisibility::Keys.shows(false, true));
        assert!(!AttributeVisibility::Primary.shows(false, true));
        assert!(!AttributeVisibility::None.shows(true, true));
        assert_eq!("KEYS".parse::<AttributeVisibility>(), Ok(AttributeVisibility::Keys));
    }
}
