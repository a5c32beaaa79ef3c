use std::time::Duration;

/// Default timeout for opening a listener.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for closing a listener.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for accepting a channel.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default maximum length of a single framed message.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Timeouts a channel manager hands to its acceptors and inner listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub open: Duration,
    pub close: Duration,
    pub receive: Duration,
}

impl Timeouts {
    pub fn new() -> Self {
        Self {
            open: DEFAULT_OPEN_TIMEOUT,
            close: DEFAULT_CLOSE_TIMEOUT,
            receive: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close = timeout;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive = timeout;
        self
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub uri: String,
    pub timeouts: Timeouts,
}

impl ListenerConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FramingConfig {
    pub max_frame_length: usize,
}

impl FramingConfig {
    pub fn new() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self::new()
    }
}
