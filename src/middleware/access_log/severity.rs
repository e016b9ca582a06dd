use std::fmt;

/// Level an access line is written at. Derived from the final status code;
/// never stored on its own.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// `>= 400` is an error, `>= 300` a warning, everything else (1xx
    /// included) informational.
    pub fn classify(status: u16) -> Self {
        if status >= 400 {
            Self::Error
        } else if status >= 300 {
            Self::Warn
        } else {
            Self::Info
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info  => "info",
            Self::Warn  => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
