//! Local progress-token registry.
//!
//! Tokens are monotonically increasing integers. An update that reaches or
//! passes `total` marks the entry complete.

use std::collections::HashMap;

use mcp_types::McpError;
use mcp_types::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub progress: f64,
    pub total: f64,
    pub completed: bool,
}

#[derive(Default)]
pub(crate) struct ProgressRegistry {
    next_token: i64,
    entries: HashMap<i64, ProgressState>,
}

impl ProgressRegistry {
    pub(crate) fn create(&mut self, total: f64) -> i64 {
        self.next_token += 1;
        let token = self.next_token;
        self.entries.insert(
            token,
            ProgressState {
                progress: 0.0,
                total,
                completed: false,
            },
        );
        token
    }

    pub(crate) fn update(&mut self, token: i64, progress: f64) -> Result<ProgressState> {
        let entry = self
            .entries
            .get_mut(&token)
            .ok_or_else(|| McpError::NotFound(format!("progress token {token}")))?;
        entry.progress = progress.min(entry.total);
        if progress >= entry.total {
            entry.completed = true;
        }
        Ok(*entry)
    }

    pub(crate) fn complete(&mut self, token: i64) -> Result<ProgressState> {
        let entry = self
            .entries
            .get_mut(&token)
            .ok_or_else(|| McpError::NotFound(format!("progress token {token}")))?;
        entry.progress = entry.total;
        entry.completed = true;
        Ok(*entry)
    }

    pub(crate) fn get(&self, token: i64) -> Result<ProgressState> {
        self.entries
            .get(&token)
            .copied()
            .ok_or_else(|| McpError::NotFound(format!("progress token {token}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_are_monotonic() {
        let mut registry = ProgressRegistry::default();
        let first = registry.create(10.0);
        let second = registry.create(5.0);
        assert!(second > first);
    }

    #[test]
    fn updates_past_total_auto_complete() {
        let mut registry = ProgressRegistry::default();
        let token = registry.create(10.0);

        let state = registry.update(token, 4.0).expect("update");
        assert_eq!(state.progress, 4.0);
        assert!(!state.completed);

        let state = registry.update(token, 12.0).expect("update");
        assert_eq!(state.progress, 10.0);
        assert!(state.completed);
    }

    #[test]
    fn unknown_token_is_not_found() {
        let mut registry = ProgressRegistry::default();
        assert!(matches!(
            registry.update(42, 1.0),
            Err(McpError::NotFound(_))
        ));
        assert!(matches!(registry.get(42), Err(McpError::NotFound(_))));
    }
}
