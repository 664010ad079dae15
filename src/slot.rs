use crate::binding::{Binding, Trail};
use crate::copy::CopyContext;
use crate::error::{Result, UnificationError};
use std::fmt;

/// A payload that can sit inside a [`Slot`].
///
/// The defaults describe atomic values: two values unify iff they are equal, copying is a
/// clone, and no value contains a variable. Structured payloads such as
/// [`Term`](crate::Term) override all three to recurse into their children.
pub trait Unifiable: Clone + PartialEq + fmt::Debug {
    /// Unify two concrete values, recording any variable repoints on `trail`.
    ///
    /// # Errors
    ///
    /// Returns an error when the values cannot be made equal.
    fn unify_values(lhs: &Self, rhs: &Self, _trail: &mut Trail<Self>) -> Result<()> {
        if lhs == rhs {
            Ok(())
        } else {
            Err(UnificationError::conflict(lhs, rhs))
        }
    }

    /// Copy this value, renaming variables through `context`.
    #[must_use]
    fn copy_with(&self, _context: &mut CopyContext<Self>) -> Self {
        self.clone()
    }

    /// Whether `binding`'s equivalence class occurs anywhere inside this value.
    fn contains(&self, _binding: &Binding<Self>) -> bool {
        false
    }
}

macro_rules! atomic_unifiable {
    ($($ty:ty),* $(,)?) => {
        $(impl Unifiable for $ty {})*
    };
}

atomic_unifiable!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    &'static str,
);

/// A unification cell: either a concrete value or a logic variable.
pub enum Slot<V> {
    /// A value held directly
    Literal(V),
    /// An indirection through a logic variable
    Variable(Binding<V>),
}

impl<V> Slot<V> {
    /// Wrap a concrete value.
    #[must_use]
    pub fn lit(value: V) -> Self {
        Self::Literal(value)
    }

    /// Refer to an existing variable.
    #[must_use]
    pub fn var(binding: &Binding<V>) -> Self {
        Self::Variable(binding.clone())
    }

    /// The variable behind this slot, if it is one.
    #[must_use]
    pub fn as_variable(&self) -> Option<&Binding<V>> {
        match self {
            Self::Variable(binding) => Some(binding),
            Self::Literal(_) => None,
        }
    }

    /// Run `f` on the literal or on the variable's current value, without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&V>) -> R) -> R {
        match self {
            Self::Literal(value) => f(Some(value)),
            Self::Variable(binding) => binding.with_value(f),
        }
    }
}

impl<V: Clone> Slot<V> {
    /// The literal, or the variable's current value.
    #[must_use]
    pub fn value(&self) -> Option<V> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Variable(binding) => binding.value(),
        }
    }
}

impl<V: Unifiable> Slot<V> {
    /// Unify two slots.
    ///
    /// Literals unify through [`Unifiable::unify_values`], a variable against a literal
    /// resolves the variable, and two variables merge their classes.
    ///
    /// # Errors
    ///
    /// Returns the first conflict encountered. Repoints made before the failure stay on
    /// `trail` for the caller to undo.
    pub fn unify(lhs: &Self, rhs: &Self, trail: &mut Trail<V>) -> Result<()> {
        match (lhs, rhs) {
            (Self::Literal(left), Self::Literal(right)) => V::unify_values(left, right, trail),
            (Self::Variable(binding), Self::Literal(value))
            | (Self::Literal(value), Self::Variable(binding)) => {
                binding.resolve(value.clone(), trail)
            }
            (Self::Variable(left), Self::Variable(right)) => left.bind(right, trail),
        }
    }

    /// Copy this slot through `context`.
    ///
    /// An unbound variable maps to the context's fresh variable for its class; a bound
    /// variable is replaced by a literal copy of its value.
    #[must_use]
    pub fn copy_with(&self, context: &mut CopyContext<V>) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.copy_with(context)),
            Self::Variable(binding) => binding.with_value(|value| match value {
                Some(value) => Self::Literal(value.copy_with(context)),
                None => Self::Variable(context.mapped(binding)),
            }),
        }
    }

    /// Whether `binding`'s class occurs in this slot.
    pub fn contains(&self, binding: &Binding<V>) -> bool {
        match self {
            Self::Literal(value) => value.contains(binding),
            Self::Variable(inner) => {
                inner.is_bound_to(binding)
                    || inner.with_value(|value| value.is_some_and(|v| v.contains(binding)))
            }
        }
    }
}

impl<V> Clone for Slot<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Variable(binding) => Self::Variable(binding.clone()),
        }
    }
}

impl<V> From<Binding<V>> for Slot<V> {
    fn from(binding: Binding<V>) -> Self {
        Self::Variable(binding)
    }
}

impl<V> From<&Binding<V>> for Slot<V> {
    fn from(binding: &Binding<V>) -> Self {
        Self::Variable(binding.clone())
    }
}

/// Slots are equal when they observe equal values or belong to the same class.
impl<V: PartialEq> PartialEq for Slot<V> {
    fn eq(&self, other: &Self) -> bool {
        if let (Self::Variable(left), Self::Variable(right)) = (self, other) {
            if left.is_bound_to(right) {
                return true;
            }
        }
        self.with_value(|left| {
            other.with_value(|right| matches!((left, right), (Some(l), Some(r)) if l == r))
        })
    }
}

impl<V: fmt::Debug> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value:?}"),
            Self::Variable(binding) => write!(f, "{binding:?}"),
        }
    }
}

impl<V: fmt::Display> fmt::Display for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(binding) => write!(f, "{binding}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_literal() {
        let mut trail = Trail::new();
        assert!(Slot::unify(&Slot::lit(5), &Slot::lit(5), &mut trail).is_ok());
        assert!(matches!(
            Slot::unify(&Slot::lit(5), &Slot::lit(6), &mut trail),
            Err(UnificationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_variable_literal_either_side() {
        let mut trail = Trail::new();
        let x = Binding::<&'static str>::new();
        Slot::unify(&Slot::lit("a"), &Slot::var(&x), &mut trail).unwrap();
        assert_eq!(x.value(), Some("a"));

        let y = Binding::<&'static str>::new();
        Slot::unify(&Slot::var(&y), &Slot::lit("b"), &mut trail).unwrap();
        assert_eq!(y.value(), Some("b"));

        assert!(Slot::unify(&Slot::var(&x), &Slot::var(&y), &mut trail).is_err());
    }

    #[test]
    fn test_with_value_sees_literal_and_variable() {
        let mut trail = Trail::new();
        let x = Binding::<i64>::new();
        assert_eq!(Slot::lit(3).with_value(|v| v.copied()), Some(3));
        assert_eq!(Slot::var(&x).with_value(|v| v.copied()), None);

        x.resolve(4, &mut trail).unwrap();
        assert_eq!(Slot::var(&x).with_value(|v| v.copied()), Some(4));
    }

    #[test]
    fn test_variable_variable_then_literal() {
        let mut trail = Trail::new();
        let (x, y) = (Binding::<i32>::new(), Binding::new());
        Slot::unify(&Slot::var(&x), &Slot::var(&y), &mut trail).unwrap();
        Slot::unify(&Slot::var(&y), &Slot::lit(1), &mut trail).unwrap();
        assert_eq!(Slot::var(&x).value(), Some(1));
    }

    #[test]
    fn test_equality_dereferences() {
        let mut trail = Trail::new();
        let (x, y) = (Binding::<i32>::new(), Binding::new());
        assert_ne!(Slot::var(&x), Slot::var(&y), "Distinct unbound variables differ");

        x.bind(&y, &mut trail).unwrap();
        assert_eq!(Slot::var(&x), Slot::var(&y), "Bound together means equal");

        x.resolve(3, &mut trail).unwrap();
        assert_eq!(Slot::var(&y), Slot::lit(3));
    }

    #[test]
    fn test_copy_replaces_bound_variable_with_literal() {
        let mut trail = Trail::new();
        let x = Binding::<i32>::new();
        x.resolve(8, &mut trail).unwrap();

        let mut context = CopyContext::new();
        let copy = Slot::var(&x).copy_with(&mut context);
        assert!(matches!(copy, Slot::Literal(8)));
        assert!(context.is_empty());
    }
}
