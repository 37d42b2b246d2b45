#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReaderLimits {
    /// Longest unterminated line the reader will buffer.
    pub max_line_bytes: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// Toggles for the relay loop.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RelayOptions {
    /// Suppress header forwarding; set when this process continues a restart.
    pub restarted: bool,
    /// Append a synthetic field reporting the skip counter.
    pub profile_skipped_statuses: bool,
}
