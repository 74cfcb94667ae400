use ratatui::style::{Color, Modifier, Style};

/// The persisted light/dark choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl ThemePreference {
    /// Only the dark preference is stored; light is the absence of a value.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("dark") => ThemePreference::Dark,
            _ => ThemePreference::Light,
        }
    }

    pub fn stored_value(self) -> Option<&'static str> {
        match self {
            ThemePreference::Light => None,
            ThemePreference::Dark => Some("dark"),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::Light,
        }
    }

    /// Label for the toggle, naming the theme it switches to.
    pub fn toggle_label(self) -> &'static str {
        match self {
            ThemePreference::Light => "Dark",
            ThemePreference::Dark => "Light",
        }
    }

    pub fn theme(self) -> Theme {
        match self {
            ThemePreference::Light => Theme::light(),
            ThemePreference::Dark => Theme::dark(),
        }
    }
}

/// Terminal colors for the panes and overlays
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the panes
    pub background: Color,

    /// Text color for the panes
    pub foreground: Color,

    /// Border color for the focused pane
    pub focused_border: Color,

    /// Border color for unfocused panes
    pub border: Color,

    /// Foreground (text) color for the status bar
    pub status_bar_fg: Color,

    /// Background color for the status bar
    pub status_bar_bg: Color,

    /// Color for the current file name in the status bar
    pub filename_color: Color,

    /// Foreground color for active selection
    pub selection_fg: Color,

    /// Background color for active selection
    pub selection_bg: Color,

    /// Color for HTML markup in the rendered pane
    pub markup_color: Color,

    pub menu_fg: Color,
    pub menu_bg: Color,
    pub menu_selected_fg: Color,
    pub menu_selected_bg: Color,

    /// Color for error text (failed passes, assistant errors)
    pub error_color: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

impl Theme {
    pub fn light() -> Self {
        Self {
            background: Color::Reset,
            foreground: Color::Reset,
            focused_border: Color::Blue,
            border: Color::Gray,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            filename_color: Color::LightYellow,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            markup_color: Color::DarkGray,
            menu_fg: Color::White,
            menu_bg: Color::Black,
            menu_selected_fg: Color::White,
            menu_selected_bg: Color::LightBlue,
            error_color: Color::Red,
        }
    }

    pub fn dark() -> Self {
        Self {
            background: Color::Black,
            foreground: Color::Gray,
            focused_border: Color::LightCyan,
            border: Color::DarkGray,
            status_bar_fg: Color::Black,
            status_bar_bg: Color::Cyan,
            filename_color: Color::Blue,
            selection_fg: Color::Black,
            selection_bg: Color::Gray,
            markup_color: Color::DarkGray,
            menu_fg: Color::Gray,
            menu_bg: Color::Rgb(30, 30, 30),
            menu_selected_fg: Color::Black,
            menu_selected_bg: Color::LightCyan,
            error_color: Color::LightRed,
        }
    }

    pub fn pane_style(&self) -> Style {
        Style::default().fg(self.foreground).bg(self.background)
    }

    pub fn border_style(&self, focused: bool) -> Style {
        if focused {
            Style::default()
                .fg(self.focused_border)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.border)
        }
    }

    /// Get the style for the status bar
    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    /// Get the style for the filename in the status bar
    pub fn filename_style(&self) -> Style {
        Style::default().fg(self.filename_color)
    }

    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    pub fn markup_style(&self) -> Style {
        Style::default().fg(self.markup_color)
    }

    pub fn menu_style(&self) -> Style {
        Style::default().fg(self.menu_fg).bg(self.menu_bg)
    }

    pub fn menu_selected_style(&self) -> Style {
        Style::default()
            .fg(self.menu_selected_fg)
            .bg(self.menu_selected_bg)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error_color)
    }
}
