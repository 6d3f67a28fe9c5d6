use std::collections::HashSet;

use ratatui::style::Color;

use super::ThemeName;

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    names: HashSet<ThemeName>,
}

impl ThemeRegistry {
    pub fn contains(&self, theme: &ThemeName) -> bool {
        self.names.contains(theme)
    }

    pub fn all(&self) -> impl Iterator<Item = &ThemeName> {
        self.names.iter()
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        let names = [ThemeName::Dark, ThemeName::Light, ThemeName::HighContrast]
            .into_iter()
            .collect();
        Self { names }
    }
}

/// Colours the table UI draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: Color,
    pub muted: Color,
    pub selection_fg: Color,
    pub selection_bg: Color,
    pub dirty: Color,
    pub busy: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub highlight: Color,
}

impl Palette {
    pub fn for_theme(theme: &ThemeName) -> Self {
        match theme {
            ThemeName::Dark => Palette {
                accent: Color::Cyan,
                muted: Color::Gray,
                selection_fg: Color::Black,
                selection_bg: Color::Blue,
                dirty: Color::Yellow,
                busy: Color::Magenta,
                error: Color::Red,
                warning: Color::LightRed,
                success: Color::Green,
                highlight: Color::Yellow,
            },
            ThemeName::Light => Palette {
                accent: Color::Blue,
                muted: Color::DarkGray,
                selection_fg: Color::White,
                selection_bg: Color::Blue,
                dirty: Color::Rgb(176, 112, 0),
                busy: Color::Magenta,
                error: Color::Red,
                warning: Color::Rgb(200, 80, 0),
                success: Color::Green,
                highlight: Color::Rgb(176, 112, 0),
            },
            ThemeName::HighContrast => Palette {
                accent: Color::White,
                muted: Color::White,
                selection_fg: Color::Black,
                selection_bg: Color::White,
                dirty: Color::LightYellow,
                busy: Color::LightMagenta,
                error: Color::LightRed,
                warning: Color::LightRed,
                success: Color::LightGreen,
                highlight: Color::LightYellow,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_every_palette() {
        let registry = ThemeRegistry::default();
        assert_eq!(registry.all().count(), 3);
        for theme in registry.all() {
            let palette = Palette::for_theme(theme);
            assert_ne!(palette.selection_fg, palette.selection_bg);
        }
    }
}
