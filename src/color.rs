//! ANSI colorization of rendered diff lines

/// Prefix/suffix bytes wrapped around already-rendered lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn wrap(&self, style: &str, line: &str) -> String {
        if !self.enabled || line.is_empty() {
            return line.to_string();
        }
        let (text, newline) = match line.strip_suffix('\n') {
            Some(text) => (text, "\n"),
            None => (line, ""),
        };
        format!("{}{}{}{}", style, text, RESET, newline)
    }

    pub fn title(&self, line: &str) -> String {
        self.wrap(BOLD, line)
    }

    pub fn section(&self, line: &str) -> String {
        self.wrap(CYAN, line)
    }

    /// Colorize a unified diff body line by its leading marker.
    pub fn line(&self, line: &str) -> String {
        if line.starts_with("---") || line.starts_with("+++") {
            self.wrap(BOLD, line)
        } else if line.starts_with("@@") {
            self.wrap(CYAN, line)
        } else if line.starts_with('-') {
            self.wrap(RED, line)
        } else if line.starts_with('+') {
            self.wrap(GREEN, line)
        } else {
            line.to_string()
        }
    }

    /// Colorize every line of a unified diff text.
    pub fn body(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.split_inclusive('\n').map(|line| self.line(line)).collect()
    }
}
