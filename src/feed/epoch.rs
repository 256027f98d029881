use super::types::FeedMode;

/// Ticket carried by an in-flight load: the epoch and mode it was issued
/// for. A continuation may only touch shared state while its token is still
/// current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken {
    epoch: u64,
    mode: FeedMode,
}

impl LoadToken {
    pub fn new(epoch: u64, mode: FeedMode) -> Self {
        Self { epoch, mode }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }
}

/// Monotonic load counter. Every mode switch and every refresh advances
/// it, which invalidates all tokens issued before.
#[derive(Debug, Default)]
pub struct LoadEpoch {
    current: u64,
}

impl LoadEpoch {
    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn advance(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    pub fn token(&self, mode: FeedMode) -> LoadToken {
        LoadToken::new(self.current, mode)
    }

    pub fn is_current(&self, token: &LoadToken) -> bool {
        token.epoch == self.current
    }
}
