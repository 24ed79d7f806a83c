//! Exact prefix index over filenames.
//!
//! Keys are walked as Unicode scalar values, case-sensitive and without
//! normalization. Nodes are only ever added.

use std::collections::HashMap;

use super::IndexError;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    terminal: bool,
}

/// Character trie answering exact-match and prefix-existence queries.
#[derive(Debug, Default)]
pub struct PrefixIndex {
    root: TrieNode,
    nodes: usize,
    entries: usize,
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `s`, creating one node per new character transition.
    ///
    /// Fails with [`IndexError::ResourceExhausted`] if a node cannot be
    /// allocated; nodes created before the failure stay reachable but the
    /// string is not marked terminal.
    pub fn insert(&mut self, s: &str) -> Result<(), IndexError> {
        let mut node = &mut self.root;
        let mut created = 0;
        for ch in s.chars() {
            if !node.children.contains_key(&ch) {
                node.children
                    .try_reserve(1)
                    .map_err(|_| IndexError::ResourceExhausted)?;
                created += 1;
            }
            node = node.children.entry(ch).or_default();
        }
        self.nodes += created;
        if !node.terminal {
            node.terminal = true;
            self.entries += 1;
        }
        Ok(())
    }

    /// True iff `s` was inserted exactly.
    pub fn search_exact(&self, s: &str) -> bool {
        self.walk(s).is_some_and(|node| node.terminal)
    }

    /// True iff some inserted string starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.walk(prefix).is_some()
    }

    /// Distinct strings inserted.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Nodes below the root.
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    fn walk(&self, s: &str) -> Option<&TrieNode> {
        s.chars()
            .try_fold(&self.root, |node, ch| node.children.get(&ch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_index_has_only_the_empty_prefix() {
        let trie = PrefixIndex::new();
        assert!(trie.has_prefix(""));
        assert!(!trie.search_exact(""));
        assert!(!trie.has_prefix("a"));
        assert!(trie.is_empty());
    }

    #[test]
    fn exact_and_prefix_queries() {
        let mut trie = PrefixIndex::new();
        trie.insert("report-2024.pdf").unwrap();

        assert!(trie.search_exact("report-2024.pdf"));
        assert!(!trie.search_exact("report"));
        assert!(!trie.search_exact("report-2024.pdf.bak"));

        let name = "report-2024.pdf";
        for end in 1..=name.len() {
            assert!(trie.has_prefix(&name[..end]), "prefix {}", &name[..end]);
        }
        assert!(!trie.has_prefix("rep0rt"));
        assert!(!trie.has_prefix("report-2024.pdfx"));
    }

    #[test]
    fn prefix_of_inserted_word_is_not_exact() {
        let mut trie = PrefixIndex::new();
        trie.insert("notes").unwrap();
        trie.insert("note").unwrap();
        assert!(trie.search_exact("note"));
        assert!(trie.search_exact("notes"));
        assert!(!trie.search_exact("not"));
        assert!(trie.has_prefix("not"));
    }

    #[test]
    fn empty_string_marks_root_terminal() {
        let mut trie = PrefixIndex::new();
        trie.insert("").unwrap();
        assert!(trie.search_exact(""));
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.node_count(), 0);
    }

    #[test]
    fn reinsert_does_not_grow() {
        let mut trie = PrefixIndex::new();
        trie.insert("abc").unwrap();
        trie.insert("abd").unwrap();
        assert_eq!(trie.node_count(), 4);
        trie.insert("abc").unwrap();
        assert_eq!(trie.node_count(), 4);
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let mut trie = PrefixIndex::new();
        trie.insert("Invoice.txt").unwrap();
        assert!(trie.has_prefix("Inv"));
        assert!(!trie.has_prefix("inv"));
        assert!(!trie.search_exact("invoice.txt"));
    }

    #[test]
    fn multibyte_characters_are_single_steps() {
        let mut trie = PrefixIndex::new();
        trie.insert("résumé.docx").unwrap();
        trie.insert("日本語.txt").unwrap();

        assert!(trie.has_prefix("ré"));
        assert!(trie.has_prefix("日本"));
        assert!(trie.search_exact("日本語.txt"));
        assert_eq!(trie.node_count(), "résumé.docx".chars().count() + "日本語.txt".chars().count());
    }

    #[test]
    fn no_normalization_between_composed_forms() {
        let mut trie = PrefixIndex::new();
        // precomposed U+00E9
        trie.insert("caf\u{e9}").unwrap();
        // e + combining acute
        assert!(!trie.has_prefix("cafe\u{301}"));
        assert!(!trie.has_prefix("cafe"));
    }

    #[test]
    fn unrelated_strings_have_no_prefix_hit() {
        let mut trie = PrefixIndex::new();
        for name in ["alpha.txt", "beta.txt", "gamma.bin"] {
            trie.insert(name).unwrap();
        }
        for missing in ["delta", "alphb", "b3", "Gamma", "x"] {
            assert!(!trie.has_prefix(missing), "unexpected hit for {missing}");
        }
    }
}
