//! Rolling window of committed text used as an inference hint.

use std::collections::VecDeque;

/// Character-budgeted FIFO of committed fragments.
///
/// Feeding recent committed text back into inference calls keeps the
/// model's decoding continuous across span cuts and suppresses repeated
/// or hallucinated openings. The window never blocks when full; it
/// evicts oldest fragments instead.
#[derive(Debug)]
pub struct ContextManager {
    fragments: VecDeque<String>,
    total_chars: usize,
    budget_chars: usize,
}

impl ContextManager {
    pub fn new(budget_chars: usize) -> Self {
        Self {
            fragments: VecDeque::new(),
            total_chars: 0,
            budget_chars,
        }
    }

    /// Append a committed fragment, evicting oldest fragments once the
    /// character budget is exceeded. Empty fragments are ignored.
    pub fn append(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.total_chars += text.chars().count();
        self.fragments.push_back(text.to_string());

        while self.total_chars > self.budget_chars && self.fragments.len() > 1 {
            if let Some(evicted) = self.fragments.pop_front() {
                self.total_chars -= evicted.chars().count();
            }
        }
    }

    /// The whole window in chronological order.
    pub fn current(&self) -> String {
        self.fragments
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The trailing `max_chars` of the window, clipped on a char boundary.
    /// This is what actually travels with each inference call.
    pub fn hint(&self, max_chars: usize) -> String {
        let full = self.current();
        let count = full.chars().count();
        if count <= max_chars {
            return full;
        }
        full.chars().skip(count - max_chars).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.total_chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_current() {
        let mut ctx = ContextManager::new(100);
        ctx.append("hello world.");
        ctx.append("second sentence.");
        assert_eq!(ctx.current(), "hello world. second sentence.");
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut ctx = ContextManager::new(20);
        ctx.append("aaaaaaaaaa"); // 10 chars
        ctx.append("bbbbbbbbbb"); // 10 chars
        ctx.append("cccc"); // pushes over budget
        assert_eq!(ctx.current(), "bbbbbbbbbb cccc");
    }

    #[test]
    fn test_oversized_single_fragment_is_kept() {
        // A fragment larger than the whole budget must not wedge the
        // window empty; the newest fragment always survives.
        let mut ctx = ContextManager::new(5);
        ctx.append("way over budget");
        assert_eq!(ctx.current(), "way over budget");
        ctx.append("next");
        assert_eq!(ctx.current(), "next");
    }

    #[test]
    fn test_hint_clips_tail_on_char_boundary() {
        let mut ctx = ContextManager::new(100);
        ctx.append("abcdéfgh");
        assert_eq!(ctx.hint(4), "éfgh");
        assert_eq!(ctx.hint(100), "abcdéfgh");
    }

    #[test]
    fn test_ignores_empty_fragments() {
        let mut ctx = ContextManager::new(100);
        ctx.append("  ");
        ctx.append("");
        assert!(ctx.is_empty());
    }
}
