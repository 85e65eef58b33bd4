//! Folding of small incremental writes into one update per identity.

use std::collections::HashMap;

use serde::Serialize;

/// Merges same-identity deltas, keeping identities in first-seen order.
/// Identities whose deltas sum to zero are still reported so their caches
/// get invalidated.
pub fn fold_deltas<I, S>(updates: I) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    let mut folded: Vec<(String, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (identity, delta) in updates {
        let identity = identity.into();
        match index.get(&identity).copied() {
            Some(pos) => folded[pos].1 = folded[pos].1.saturating_add(delta),
            None => {
                index.insert(identity.clone(), folded.len());
                folded.push((identity, delta));
            }
        }
    }
    folded
}

/// Outcome of a batched write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Deltas handed in
    pub received: usize,
    /// Upserts handed to the writer after folding
    pub applied: usize,
    /// Cache entries removed afterwards
    pub invalidated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_merges_same_identity() {
        let folded = fold_deltas(vec![("u1", 1), ("u2", 5), ("u1", 2), ("u2", -5), ("u3", 1)]);

        assert_eq!(
            folded,
            vec![("u1".to_string(), 3), ("u2".to_string(), 0), ("u3".to_string(), 1)]
        );
    }

    #[test]
    fn test_fold_empty() {
        let folded = fold_deltas(Vec::<(String, i64)>::new());
        assert!(folded.is_empty());
    }

    #[test]
    fn test_fold_saturates() {
        let folded = fold_deltas(vec![("u", i64::MAX), ("u", 1)]);
        assert_eq!(folded[0].1, i64::MAX);
    }
}
