use std::collections::HashMap;

/// Topic matcher with MQTT-style wildcards.
///
/// - `+` matches exactly one topic level
/// - `#` matches any number of remaining levels (must be the last segment)
///
/// Levels are separated by `/`. The trie itself is not synchronized; the
/// owning channel guards it.
///
/// ```ignore
/// let mut trie = TopicTrie::new();
/// trie.insert("demo/state/change", 1);
/// trie.insert("demo/+/change", 2);
/// trie.insert("demo/#", 3);
///
/// assert_eq!(trie.match_topic("demo/state/change"), vec![1, 2, 3]);
/// ```
pub struct TopicTrie<T> {
    root: Node<T>,
    len: usize,
}

struct Node<T> {
    children: HashMap<String, Node<T>>,
    /// `+` child.
    single: Option<Box<Node<T>>>,
    /// Values registered with a trailing `#` at this level.
    multi: Vec<T>,
    /// Values whose pattern ends exactly here.
    values: Vec<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            single: None,
            multi: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T: Clone> TopicTrie<T> {
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }

    /// Register a value under a pattern. Values under the same pattern keep
    /// insertion order.
    pub fn insert(&mut self, pattern: &str, value: T) {
        self.root.insert(pattern, value);
        self.len += 1;
    }

    /// All values whose pattern matches the concrete `topic`.
    ///
    /// Exact matches come first, then `+` matches, then `#` matches.
    pub fn match_topic(&self, topic: &str) -> Vec<T> {
        let mut out = Vec::new();
        self.root.collect(topic, &mut out);
        out
    }

    /// Remove values under `pattern` for which `predicate` holds.
    ///
    /// Returns the number removed. Emptied branches are pruned.
    pub fn remove<F>(&mut self, pattern: &str, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let removed = self.root.remove(pattern, &predicate);
        self.len -= removed;
        removed
    }

    /// Number of registered values across all patterns.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Clone> Default for TopicTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Node<T> {
    fn insert(&mut self, pattern: &str, value: T) {
        if pattern.is_empty() {
            self.values.push(value);
            return;
        }
        let (first, rest) = split_first(pattern);
        match first {
            "+" => self
                .single
                .get_or_insert_with(Box::default)
                .insert(rest, value),
            // Anything after `#` is ignored.
            "#" => self.multi.push(value),
            segment => self
                .children
                .entry(segment.to_string())
                .or_default()
                .insert(rest, value),
        }
    }

    fn collect(&self, topic: &str, out: &mut Vec<T>) {
        if topic.is_empty() {
            out.extend(self.values.iter().cloned());
            // `#` also matches zero remaining levels.
            out.extend(self.multi.iter().cloned());
            return;
        }
        let (first, rest) = split_first(topic);
        if let Some(child) = self.children.get(first) {
            child.collect(rest, out);
        }
        if let Some(single) = &self.single {
            single.collect(rest, out);
        }
        out.extend(self.multi.iter().cloned());
    }

    fn remove<F>(&mut self, pattern: &str, predicate: &F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        if pattern.is_empty() {
            return retain_count(&mut self.values, predicate);
        }
        let (first, rest) = split_first(pattern);
        match first {
            "+" => {
                let Some(child) = self.single.as_mut() else {
                    return 0;
                };
                let removed = child.remove(rest, predicate);
                if child.is_empty() {
                    self.single = None;
                }
                removed
            }
            "#" => retain_count(&mut self.multi, predicate),
            segment => {
                let Some(child) = self.children.get_mut(segment) else {
                    return 0;
                };
                let removed = child.remove(rest, predicate);
                if child.is_empty() {
                    self.children.remove(segment);
                }
                removed
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.multi.is_empty()
            && self.single.is_none()
            && self.children.is_empty()
    }
}

fn retain_count<T, F>(values: &mut Vec<T>, predicate: &F) -> usize
where
    F: Fn(&T) -> bool,
{
    let before = values.len();
    values.retain(|v| !predicate(v));
    before - values.len()
}

/// Split a topic into (first_level, rest).
///
/// `"demo/state/change"` -> `("demo", "state/change")`
/// `"demo"` -> `("demo", "")`
fn split_first(topic: &str) -> (&str, &str) {
    match topic.split_once('/') {
        Some((first, rest)) => (first, rest),
        None => (topic, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Exact match
    // ========================================================================

    #[test]
    fn exact_match() {
        let mut trie = TopicTrie::new();
        trie.insert("demo/state/change", 1);
        trie.insert("demo/state/reset", 2);

        assert_eq!(trie.match_topic("demo/state/change"), vec![1]);
        assert_eq!(trie.match_topic("demo/state/reset"), vec![2]);
        assert!(trie.match_topic("demo/state").is_empty());
        assert!(trie.match_topic("demo/state/change/x").is_empty());
    }

    #[test]
    fn same_pattern_keeps_insertion_order() {
        let mut trie = TopicTrie::new();
        trie.insert("a/b", 3);
        trie.insert("a/b", 1);
        trie.insert("a/b", 2);

        assert_eq!(trie.match_topic("a/b"), vec![3, 1, 2]);
    }

    #[test]
    fn similar_prefix_does_not_match() {
        let mut trie = TopicTrie::new();
        trie.insert("demo/state/change", 1);

        assert!(trie.match_topic("demo2/state/change").is_empty());
    }

    // ========================================================================
    // Wildcards
    // ========================================================================

    #[test]
    fn single_wildcard_matches_one_level() {
        let mut trie = TopicTrie::new();
        trie.insert("+/state/change", 7);

        assert_eq!(trie.match_topic("one/state/change"), vec![7]);
        assert_eq!(trie.match_topic("two/state/change"), vec![7]);
        assert!(trie.match_topic("a/b/state/change").is_empty());
        assert!(trie.match_topic("state/change").is_empty());
    }

    #[test]
    fn multi_wildcard_matches_remaining_levels() {
        let mut trie = TopicTrie::new();
        trie.insert("demo/#", 9);

        assert_eq!(trie.match_topic("demo/state/change"), vec![9]);
        assert_eq!(trie.match_topic("demo/state"), vec![9]);
        // Zero remaining levels.
        assert_eq!(trie.match_topic("demo"), vec![9]);
        assert!(trie.match_topic("other/state").is_empty());
    }

    #[test]
    fn root_wildcard_matches_everything() {
        let mut trie = TopicTrie::new();
        trie.insert("#", 1);

        assert_eq!(trie.match_topic("a"), vec![1]);
        assert_eq!(trie.match_topic("a/b/c"), vec![1]);
    }

    #[test]
    fn exact_then_single_then_multi() {
        let mut trie = TopicTrie::new();
        trie.insert("#", 3);
        trie.insert("demo/+/change", 2);
        trie.insert("demo/state/change", 1);

        assert_eq!(trie.match_topic("demo/state/change"), vec![1, 2, 3]);
    }

    // ========================================================================
    // Remove
    // ========================================================================

    #[test]
    fn remove_by_predicate() {
        let mut trie = TopicTrie::new();
        trie.insert("a/b", 1);
        trie.insert("a/b", 2);

        assert_eq!(trie.remove("a/b", |v| *v == 1), 1);
        assert_eq!(trie.match_topic("a/b"), vec![2]);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn remove_wildcards() {
        let mut trie = TopicTrie::new();
        trie.insert("a/+", 1);
        trie.insert("a/#", 2);

        assert_eq!(trie.remove("a/+", |_| true), 1);
        assert_eq!(trie.remove("a/#", |_| true), 1);
        assert!(trie.match_topic("a/x").is_empty());
        assert!(trie.is_empty());
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut trie: TopicTrie<u32> = TopicTrie::new();
        assert_eq!(trie.remove("nothing/here", |_| true), 0);
        assert_eq!(trie.remove("+/x", |_| true), 0);
        assert!(trie.is_empty());
    }

    #[test]
    fn remove_prunes_empty_branches() {
        let mut trie = TopicTrie::new();
        trie.insert("a/b/c", 1);
        trie.remove("a/b/c", |_| true);

        assert!(trie.root.is_empty());
    }
}
