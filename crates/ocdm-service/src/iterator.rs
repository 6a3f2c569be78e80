//! Restartable snapshot enumeration of strings.

/// Finite sequence of strings captured at creation time.
///
/// Iterating consumes nothing: [`reset`](Self::reset) rewinds to the first
/// element and the same sequence is produced again. Later changes to the
/// source the snapshot was taken from are not observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringIterator {
    items: Vec<String>,
    position: usize,
}

impl StringIterator {
    /// Create an iterator over `items`.
    pub fn new(items: Vec<String>) -> Self {
        Self { items, position: 0 }
    }

    /// Rewind to the first element.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Element most recently returned by `next`, if any.
    pub fn current(&self) -> Option<&str> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.items.get(index))
            .map(String::as_str)
    }

    /// Whether `current` refers to an element.
    pub fn is_valid(&self) -> bool {
        self.position > 0 && self.position <= self.items.len()
    }

    /// Total number of elements, independent of the position.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// All elements of the snapshot.
    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

impl Iterator for StringIterator {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.get(self.position).cloned()?;
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StringIterator {}

impl<S: Into<String>> FromIterator<S> for StringIterator {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reset_replays_sequence() {
        let mut iter: StringIterator = ["a", "b", "c"].into_iter().collect();
        let first: Vec<String> = iter.by_ref().collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(iter.next(), None);

        iter.reset();
        let second: Vec<String> = iter.collect();
        assert_eq!(second, first);
    }

    #[test]
    fn test_current_and_validity() {
        let mut iter = StringIterator::new(vec!["x".to_string(), "y".to_string()]);
        assert!(!iter.is_valid());
        assert_eq!(iter.current(), None);

        iter.next();
        assert!(iter.is_valid());
        assert_eq!(iter.current(), Some("x"));

        iter.next();
        assert_eq!(iter.current(), Some("y"));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.current(), Some("y"));
    }

    #[test]
    fn test_len_tracks_remaining() {
        let mut iter: StringIterator = ["a", "b"].into_iter().collect();
        assert_eq!(iter.len(), 2);
        iter.next();
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.total(), 2);
    }

    #[test]
    fn test_empty() {
        let mut iter = StringIterator::default();
        assert_eq!(iter.len(), 0);
        assert_eq!(iter.next(), None);
        assert!(!iter.is_valid());
    }
}
