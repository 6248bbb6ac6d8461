//! Node naming
//!
//! Auto-generated node names are spreadsheet-style column labels of a
//! monotonically increasing counter: 1 → "A", 26 → "Z", 27 → "AA". This is a
//! bijective base-26 numeral; there is no zero digit.

use std::collections::HashSet;

/// Bijective base-26 letters for `n >= 1`
pub fn letters(mut n: usize) -> String {
    debug_assert!(n > 0, "label counter starts at 1");
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    // only ASCII capitals were pushed
    String::from_utf8(out).unwrap_or_default()
}

/// Name composed for a terminal whose intended name is taken
pub fn composed(label: usize, intended: &str) -> String {
    format!("{} ({})", letters(label), intended)
}

/// Counter plus the set of names already handed out
#[derive(Debug, Default)]
pub struct NameAllocator {
    counter: usize,
    taken: HashSet<String>,
    /// Names intermediate nodes must never receive
    forbidden: HashSet<String>,
}

impl NameAllocator {
    pub fn new(forbidden: impl IntoIterator<Item = String>) -> Self {
        Self {
            counter: 0,
            taken: HashSet::new(),
            forbidden: forbidden.into_iter().collect(),
        }
    }

    /// Next counter value, consumed by every created node
    pub fn next_label(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn is_forbidden(&self, name: &str) -> bool {
        self.forbidden.contains(name)
    }

    /// Label and name for an intermediate node, skipping forbidden names
    pub fn intermediate(&mut self) -> (usize, String) {
        loop {
            let label = self.next_label();
            let name = letters(label);
            if !self.is_forbidden(&name) && !self.is_taken(&name) {
                self.taken.insert(name.clone());
                return (label, name);
            }
            tracing::trace!(label, %name, "skipping reserved node name");
        }
    }

    /// Label and name for a terminal node
    ///
    /// The intended name is used when free. Otherwise the name is composed
    /// from the node's label letters and the intended name, drawing fresh
    /// counter values until the composition is unique. The third element
    /// counts the discarded labels.
    pub fn terminal(&mut self, intended: &str) -> (usize, String, usize) {
        let mut label = self.next_label();
        if !self.is_taken(intended) {
            self.taken.insert(intended.to_string());
            return (label, intended.to_string(), 0);
        }
        let mut retries = 0;
        loop {
            let name = composed(label, intended);
            if !self.is_taken(&name) {
                self.taken.insert(name.clone());
                return (label, name, retries);
            }
            retries += 1;
            label = self.next_label();
        }
    }

    pub fn taken_names(&self) -> impl Iterator<Item = &str> {
        self.taken.iter().map(String::as_str)
    }
}
