use std::collections::HashSet;

/// Uniqueness-preserving string set used to reconcile desired keys against
/// cached records. Iteration order is unspecified; callers must not depend
/// on it.
#[derive(Debug, Default, Clone)]
pub struct KeySet {
    elements: HashSet<String>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: impl Into<String>) {
        self.elements.insert(value.into());
    }

    pub fn remove(&mut self, value: &str) {
        self.elements.remove(value);
    }

    pub fn contains(&self, value: &str) -> bool {
        self.elements.contains(value)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_values(self) -> Vec<String> {
        self.elements.into_iter().collect()
    }

    /// Keys in `wanted` that do not appear among `have`. Empty `wanted`
    /// yields an empty set; empty `have` yields `wanted` unchanged.
    pub fn difference<W, H>(wanted: W, have: H) -> KeySet
    where
        W: IntoIterator,
        W::Item: Into<String>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let mut set = KeySet::new();
        for key in wanted {
            set.insert(key);
        }
        for key in have {
            set.remove(key.as_ref());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(set: KeySet) -> Vec<String> {
        let mut values = set.into_values();
        values.sort();
        values
    }

    #[test]
    fn difference_removes_present_keys() {
        let wanted = ["a", "b", "c"];
        let have = ["b"];
        assert_eq!(sorted(KeySet::difference(wanted, have)), vec!["a", "c"]);
    }

    #[test]
    fn difference_result_is_subset_of_wanted_and_disjoint_from_have() {
        let wanted = ["a", "b", "c", "d"];
        let have = ["b", "d", "x"];
        let result = KeySet::difference(wanted, have);
        for key in result.clone().into_values() {
            assert!(wanted.contains(&key.as_str()));
            assert!(!have.contains(&key.as_str()));
        }
    }

    #[test]
    fn difference_of_empty_wanted_is_empty() {
        let wanted: [&str; 0] = [];
        assert!(KeySet::difference(wanted, ["a", "b"]).is_empty());
    }

    #[test]
    fn difference_against_empty_have_is_wanted() {
        let have: [&str; 0] = [];
        assert_eq!(
            sorted(KeySet::difference(["a", "b"], have)),
            vec!["a", "b"]
        );
    }

    #[test]
    fn duplicate_inserts_collapse() {
        let mut set = KeySet::new();
        set.insert("a");
        set.insert("a");
        assert_eq!(set.len(), 1);
        assert!(set.contains("a"));
    }
}
