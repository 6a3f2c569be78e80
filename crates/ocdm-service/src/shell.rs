//! Plugin host boundary.

/// What the hosting framework tells a service about itself.
pub trait ServiceShell {
    /// Name the host registered the service under.
    fn callsign(&self) -> &str;

    /// Configuration line (JSON) for the service.
    fn config_line(&self) -> &str;
}

/// Shell with fixed values, for embedding and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticShell {
    callsign: String,
    config_line: String,
}

impl StaticShell {
    /// Create a shell.
    pub fn new(callsign: impl Into<String>, config_line: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            config_line: config_line.into(),
        }
    }
}

impl ServiceShell for StaticShell {
    fn callsign(&self) -> &str {
        &self.callsign
    }

    fn config_line(&self) -> &str {
        &self.config_line
    }
}
