//! Filter input of the grid and when it is allowed to search

use unicode_width::UnicodeWidthStr;

/// Key presses the filter input understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Enter,
}

/// Visual style of the input box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputStyle {
    /// Compact style the grid generates on its own
    #[default]
    Compact,
    /// Matches the surrounding page's form fields
    Themed,
}

/// When a keyup on the filter input should issue a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPolicy {
    /// Every edit searches
    #[default]
    AsYouType,
    /// Search once the value has at least this many characters, on Enter,
    /// or when the input was cleared
    MinChars(usize),
}

impl FilterPolicy {
    /// Decide whether a keyup searches, and for which value.
    /// `changed` tells whether the key modified the input value.
    pub fn on_keyup(&self, value: &str, key: FilterKey, changed: bool) -> Option<String> {
        let enter = key == FilterKey::Enter;
        match *self {
            FilterPolicy::AsYouType => (changed || enter).then(|| value.to_string()),
            FilterPolicy::MinChars(min) => {
                if value.is_empty() {
                    // Clearing the box drops the filter right away
                    (changed || enter).then(String::new)
                } else if enter || (changed && value.chars().count() >= min) {
                    Some(value.to_string())
                } else {
                    None
                }
            }
        }
    }
}

/// The text box above the grid used for free-text search
#[derive(Debug, Clone, Default)]
pub struct FilterInput {
    value: String,
    cursor: usize,
    placeholder: Option<String>,
    label: Option<String>,
    style: InputStyle,
}

impl FilterInput {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            label: (!label.is_empty()).then_some(label),
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Terminal columns taken by the text before the cursor
    pub fn cursor_width(&self) -> usize {
        self.value[..self.byte_pos()].width()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn style(&self) -> InputStyle {
        self.style
    }

    pub fn set_placeholder(&mut self, text: impl Into<String>) {
        self.placeholder = Some(text.into());
    }

    /// Label announced for the input; drawn as the box title
    pub fn set_label(&mut self, text: impl Into<String>) {
        self.label = Some(text.into());
    }

    pub fn set_style(&mut self, style: InputStyle) {
        self.style = style;
    }

    /// Apply a key. Returns true when the value changed.
    pub fn apply(&mut self, key: FilterKey) -> bool {
        match key {
            FilterKey::Char(c) => {
                let at = self.byte_pos();
                self.value.insert(at, c);
                self.cursor += 1;
                true
            }
            FilterKey::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                let at = self.byte_pos();
                self.value.remove(at);
                true
            }
            FilterKey::Delete => {
                if self.cursor >= self.len() {
                    return false;
                }
                let at = self.byte_pos();
                self.value.remove(at);
                true
            }
            FilterKey::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            FilterKey::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                false
            }
            FilterKey::Home => {
                self.cursor = 0;
                false
            }
            FilterKey::End => {
                self.cursor = self.len();
                false
            }
            FilterKey::Enter => false,
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(idx, _)| idx)
            .unwrap_or(self.value.len())
    }
}
