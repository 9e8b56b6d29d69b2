use std::collections::VecDeque;

/// Bounded, insertion-ordered display buffer.
///
/// When full, appending evicts the oldest line.
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl ConsoleLog {
    /// Create an empty log. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Change capacity, keeping the most recent lines that fit.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        let excess = self.lines.len().saturating_sub(capacity);
        self.lines.drain(..excess);
        self.lines.shrink_to(capacity);
        self.capacity = capacity;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Lines oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// All lines concatenated, as a text view would show them.
    pub fn render(&self) -> String {
        self.lines.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
