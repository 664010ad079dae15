use crate::binding::Binding;
use indexmap::IndexMap;
use std::fmt;

/// Renaming table for a single copy operation.
///
/// The first time a variable's class is seen it is given a fresh, unbound variable; every later
/// occurrence of that class within the same context reuses it, so sharing between the copied
/// structures is preserved. A new context shares nothing with any earlier one.
pub struct CopyContext<V> {
    renamed: IndexMap<u64, Binding<V>>,
}

impl<V> CopyContext<V> {
    /// An empty renaming table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            renamed: IndexMap::new(),
        }
    }

    /// The fresh variable standing in for `original` within this context.
    pub fn mapped(&mut self, original: &Binding<V>) -> Binding<V> {
        self.renamed
            .entry(original.class_id())
            .or_insert_with(Binding::new)
            .clone()
    }

    /// Number of distinct classes renamed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.renamed.len()
    }

    /// Whether nothing has been renamed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty()
    }
}

impl<V> Default for CopyContext<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for CopyContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyContext")
            .field("renamed", &self.renamed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Trail;

    #[test]
    fn test_same_variable_maps_once() {
        let mut context = CopyContext::<i32>::new();
        let x = Binding::new();

        let first = context.mapped(&x);
        let second = context.mapped(&x);
        assert_eq!(first, second);
        assert_ne!(first, x, "The copy must be a new variable");
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_distinct_variables_map_apart() {
        let mut context = CopyContext::<i32>::new();
        let (x, y) = (Binding::new(), Binding::new());
        assert_ne!(context.mapped(&x), context.mapped(&y));
    }

    #[test]
    fn test_bound_together_variables_share_a_copy() {
        let mut trail = Trail::new();
        let (x, y) = (Binding::<i32>::new(), Binding::new());
        x.bind(&y, &mut trail).unwrap();

        let mut context = CopyContext::new();
        assert_eq!(context.mapped(&x), context.mapped(&y));
    }

    #[test]
    fn test_fresh_contexts_are_independent() {
        let x = Binding::<i32>::new();
        let first = CopyContext::new().mapped(&x);
        let second = CopyContext::new().mapped(&x);
        assert_ne!(first, second);
        assert!(!first.is_bound_to(&second));
    }
}
