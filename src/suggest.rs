//! Prefix autocomplete over the merged segment vocabulary.
//!
//! Character trie with a bounded top-K candidate list at every node,
//! ranked by summed document frequency (no query logs exist to rank
//! by). Nodes live in one arena vector; children are 26-way tables
//! since the vocabulary is lowercase ASCII by construction.

use std::collections::HashMap;

use crate::text;

const NO_CHILD: u32 = u32::MAX;

struct Node {
    children: [u32; 26],
    /// Top candidates passing through this node, sorted by
    /// (score desc, term asc), capped at `k_node`.
    top: Vec<(String, u32)>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: [NO_CHILD; 26],
            top: Vec::new(),
        }
    }
}

/// Prefix-indexed top-K term suggester. Rebuilt on every reload.
pub struct SuggestTrie {
    nodes: Vec<Node>,
    k_node: usize,
}

impl SuggestTrie {
    /// Build from the merged `term -> Σ df` view of all segments.
    pub fn build(scores: &HashMap<String, u32>, k_node: usize) -> Self {
        let mut trie = Self {
            nodes: vec![Node::new()],
            k_node: k_node.max(1),
        };
        for (term, &score) in scores {
            if term.is_empty() || !term.bytes().all(|b| b.is_ascii_lowercase()) {
                continue;
            }
            trie.insert(term, score);
        }
        trie
    }

    /// Empty trie (no segments loaded).
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node::new()],
            k_node: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn insert(&mut self, term: &str, score: u32) {
        let mut idx = 0usize;
        for b in term.bytes() {
            let c = (b - b'a') as usize;
            let child = self.nodes[idx].children[c];
            let child = if child == NO_CHILD {
                let new_idx = self.nodes.len() as u32;
                self.nodes.push(Node::new());
                self.nodes[idx].children[c] = new_idx;
                new_idx
            } else {
                child
            };
            idx = child as usize;
            self.offer(idx, term, score);
        }
    }

    /// Bounded insertion into a node's candidate list: append while
    /// below capacity, otherwise replace the minimum only when the
    /// incoming score exceeds it.
    fn offer(&mut self, node: usize, term: &str, score: u32) {
        let k = self.k_node;
        let top = &mut self.nodes[node].top;
        if top.len() < k {
            top.push((term.to_string(), score));
        } else {
            // Sorted (score desc, term asc): the minimum is last.
            if score <= top[k - 1].1 {
                return;
            }
            top[k - 1] = (term.to_string(), score);
        }
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }

    /// Return up to `min(k, k_node)` terms for a prefix. The input is
    /// normalized like query text (no stop-word filter); with several
    /// tokens the last one is the prefix being typed. Unknown prefixes
    /// return an empty list.
    pub fn suggest(&self, input: &str, k: usize) -> Vec<String> {
        let tokens = text::tokenize(input);
        let prefix = match tokens.last() {
            Some(p) => p,
            None => return Vec::new(),
        };

        let mut idx = 0usize;
        for b in prefix.bytes() {
            let c = (b - b'a') as usize;
            let child = self.nodes[idx].children[c];
            if child == NO_CHILD {
                return Vec::new();
            }
            idx = child as usize;
        }

        self.nodes[idx]
            .top
            .iter()
            .take(k.min(self.k_node))
            .map(|(t, _)| t.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_from(pairs: &[(&str, u32)], k_node: usize) -> SuggestTrie {
        let scores: HashMap<String, u32> =
            pairs.iter().map(|(t, s)| (t.to_string(), *s)).collect();
        SuggestTrie::build(&scores, k_node)
    }

    #[test]
    fn test_suggest_orders_by_score_then_term() {
        let trie = trie_from(
            &[("alpha", 5), ("alphabet", 2), ("alphanumeric", 7), ("beta", 9)],
            10,
        );

        assert_eq!(
            trie.suggest("alp", 2),
            vec!["alphanumeric".to_string(), "alpha".to_string()]
        );
        assert_eq!(
            trie.suggest("alp", 10),
            vec![
                "alphanumeric".to_string(),
                "alpha".to_string(),
                "alphabet".to_string()
            ]
        );
    }

    #[test]
    fn test_equal_scores_tie_break_alphabetically() {
        let trie = trie_from(&[("bravo", 4), ("brave", 4), ("brat", 4)], 10);
        assert_eq!(
            trie.suggest("bra", 3),
            vec!["brat".to_string(), "brave".to_string(), "bravo".to_string()]
        );
    }

    #[test]
    fn test_node_capacity_bounds_candidates() {
        let trie = trie_from(&[("aa", 1), ("ab", 2), ("ac", 3), ("ad", 4)], 2);
        // Node "a" only retains the two best candidates.
        assert_eq!(trie.suggest("a", 10), vec!["ad".to_string(), "ac".to_string()]);
        // Deeper nodes still know their own term.
        assert_eq!(trie.suggest("aa", 10), vec!["aa".to_string()]);
    }

    #[test]
    fn test_unknown_prefix_is_empty() {
        let trie = trie_from(&[("alpha", 5)], 10);
        assert!(trie.suggest("zz", 5).is_empty());
        assert!(trie.suggest("alphax", 5).is_empty());
    }

    #[test]
    fn test_input_normalization_uses_last_token() {
        let trie = trie_from(&[("alpha", 5), ("virus", 3)], 10);
        assert_eq!(trie.suggest("  ALP", 5), vec!["alpha".to_string()]);
        assert_eq!(trie.suggest("novel vir", 5), vec!["virus".to_string()]);
        assert!(trie.suggest("  12 34 ", 5).is_empty());
    }

    #[test]
    fn test_exact_term_is_its_own_suggestion() {
        let trie = trie_from(&[("alpha", 5), ("alphabet", 9)], 10);
        let s = trie.suggest("alpha", 10);
        assert_eq!(s, vec!["alphabet".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn test_empty_trie() {
        let trie = SuggestTrie::empty();
        assert!(trie.is_empty());
        assert!(trie.suggest("a", 5).is_empty());
    }
}
