use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid color {0:?}: expected #RGB or #RRGGBB")]
    InvalidColor(String),
    #[error("unknown font family {0:?}")]
    UnknownFont(String),
    #[error("unknown preference key {0:?}")]
    UnknownPreference(String),
    #[error("invalid value {value:?} for preference {key}")]
    InvalidPreferenceValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_normalized(self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for Rgb {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidColor(value.to_owned());
        let hex = value.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());

        match hex.len() {
            6 => Ok(Self::new(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |index: usize| channel(&hex[index..=index]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The PDF base-14 families offered for typed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FontFamily {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl FontFamily {
    pub const ALL: [FontFamily; 3] = [Self::Helvetica, Self::TimesRoman, Self::Courier];

    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }
}

impl FromStr for FontFamily {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "sans-serif" => Ok(Self::Helvetica),
            "times" | "times-roman" | "timesroman" | "serif" => Ok(Self::TimesRoman),
            "courier" | "monospace" => Ok(Self::Courier),
            _ => Err(ModelError::UnknownFont(value.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPreferences {
    pub initial_scale: f32,
    pub font_size: f32,
    pub font_color: Rgb,
    pub font_family: FontFamily,
    pub brush_color: Rgb,
    pub brush_size: f32,
    pub stamp_width: f32,
    pub default_text: String,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            initial_scale: 1.5,
            font_size: 16.0,
            font_color: Rgb::BLACK,
            font_family: FontFamily::Helvetica,
            brush_color: Rgb::BLACK,
            brush_size: 2.0,
            stamp_width: 150.0,
            default_text: "Type here".to_owned(),
        }
    }
}

impl EditorPreferences {
    pub const KEYS: [&'static str; 8] = [
        "initial_scale",
        "font_size",
        "font_color",
        "font_family",
        "brush_color",
        "brush_size",
        "stamp_width",
        "default_text",
    ];

    /// Clamps numeric settings into usable ranges; non-finite values fall back to defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.initial_scale = sanitize(self.initial_scale, defaults.initial_scale, 0.1, 16.0);
        self.font_size = sanitize(self.font_size, defaults.font_size, 1.0, 400.0);
        self.brush_size = sanitize(self.brush_size, defaults.brush_size, 0.5, 200.0);
        self.stamp_width = sanitize(self.stamp_width, defaults.stamp_width, 1.0, 4000.0);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ModelError> {
        let invalid = || ModelError::InvalidPreferenceValue {
            key: key.to_owned(),
            value: value.to_owned(),
        };
        let number = || value.trim().parse::<f32>().map_err(|_| invalid());

        match key {
            "initial_scale" => self.initial_scale = number()?,
            "font_size" => self.font_size = number()?,
            "font_color" => self.font_color = value.parse()?,
            "font_family" => self.font_family = value.parse()?,
            "brush_color" => self.brush_color = value.parse()?,
            "brush_size" => self.brush_size = number()?,
            "stamp_width" => self.stamp_width = number()?,
            "default_text" => self.default_text = value.to_owned(),
            _ => return Err(ModelError::UnknownPreference(key.to_owned())),
        }

        Ok(())
    }
}

fn sanitize(value: f32, fallback: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex_colors() {
        assert_eq!("#ff8000".parse::<Rgb>().expect("long hex"), Rgb::new(255, 128, 0));
        assert_eq!("00FF00".parse::<Rgb>().expect("bare hex"), Rgb::new(0, 255, 0));
        assert_eq!("#f0a".parse::<Rgb>().expect("short hex"), Rgb::new(255, 0, 170));
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["", "#12", "#12345", "#gg0000", "red"] {
            assert!(bad.parse::<Rgb>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn color_serializes_as_hex_string() {
        let json = serde_json::to_string(&Rgb::new(16, 32, 48)).expect("serialize");
        assert_eq!(json, "\"#102030\"");

        let back: Rgb = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Rgb::new(16, 32, 48));
    }

    #[test]
    fn font_family_accepts_css_style_aliases() {
        assert_eq!("serif".parse::<FontFamily>().expect("alias"), FontFamily::TimesRoman);
        assert_eq!("Courier".parse::<FontFamily>().expect("name"), FontFamily::Courier);
        assert!("Comic Sans".parse::<FontFamily>().is_err());
    }

    #[test]
    fn defaults_match_editor_toolbar() {
        let prefs = EditorPreferences::default();
        assert_eq!(prefs.initial_scale, 1.5);
        assert_eq!(prefs.font_size, 16.0);
        assert_eq!(prefs.stamp_width, 150.0);
        assert_eq!(prefs.font_family, FontFamily::Helvetica);
    }

    #[test]
    fn validated_clamps_out_of_range_values() {
        let prefs = EditorPreferences {
            initial_scale: f32::NAN,
            font_size: 0.0,
            brush_size: 10_000.0,
            ..EditorPreferences::default()
        }
        .validated();

        assert_eq!(prefs.initial_scale, 1.5);
        assert_eq!(prefs.font_size, 1.0);
        assert_eq!(prefs.brush_size, 200.0);
    }

    #[test]
    fn set_updates_named_preference() {
        let mut prefs = EditorPreferences::default();
        prefs.set("font_color", "#ff0000").expect("color should parse");
        prefs.set("font_size", "24").expect("size should parse");

        assert_eq!(prefs.font_color, Rgb::new(255, 0, 0));
        assert_eq!(prefs.font_size, 24.0);
        assert!(matches!(prefs.set("zoom", "2"), Err(ModelError::UnknownPreference(_))));
        assert!(matches!(
            prefs.set("brush_size", "thick"),
            Err(ModelError::InvalidPreferenceValue { .. })
        ));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs: EditorPreferences =
            serde_json::from_str(r#"{"font_size": 20.0}"#).expect("partial prefs should parse");
        assert_eq!(prefs.font_size, 20.0);
        assert_eq!(prefs.stamp_width, 150.0);
    }
}
