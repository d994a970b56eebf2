use std::collections::HashSet;

/// In-memory record of which sessions were opened during this run.
///
/// Scroll restoration only applies to a session revisited within the same
/// run; the first open of a session always lands at the bottom, even if a
/// persisted offset exists from an earlier run.
#[derive(Debug, Default)]
pub struct TabScope {
    visited: HashSet<String>,
}

impl TabScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `session_id` visited. Returns whether it had been visited
    /// before in this run.
    pub fn visit(&mut self, session_id: &str) -> bool {
        !self.visited.insert(session_id.to_string())
    }

    #[must_use]
    pub fn was_visited(&self, session_id: &str) -> bool {
        self.visited.contains(session_id)
    }

    pub fn forget(&mut self, session_id: &str) {
        self.visited.remove(session_id);
    }
}
