use crate::binding::{Binding, Trail};
use crate::copy::CopyContext;
use crate::error::{Result, UnificationError};
use crate::slot::{Slot, Unifiable};
use std::fmt;
use std::hash::Hash;

/// Names and constants of a knowledge base.
///
/// The engine only hashes and compares atoms; any cheap-to-clone identifier works
/// (`&'static str`, `String`, interned ids, enums).
pub trait Atom: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> Atom for T {}

/// A logic variable ranging over terms.
pub type Var<A> = Binding<Term<A>>;

/// A named node with zero or more arguments, e.g. `jaden` or `parent(matt, Child)`.
///
/// A term with no arguments is an atomic constant.
#[derive(Clone)]
pub struct Term<A> {
    name: A,
    arguments: Vec<Slot<Term<A>>>,
}

/// The `(name, arity)` signature of a term, used to index clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Functor<A> {
    /// The name of the term
    pub name: A,
    /// The number of arguments
    pub arity: usize,
}

impl<A> Functor<A> {
    /// Build a signature.
    #[must_use]
    pub fn new(name: A, arity: usize) -> Self {
        Self { name, arity }
    }
}

impl<A: fmt::Display> fmt::Display for Functor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

impl<A: Atom> Term<A> {
    /// A compound term from arbitrary slots.
    #[must_use]
    pub fn new(name: A, arguments: impl IntoIterator<Item = Slot<Term<A>>>) -> Self {
        Self {
            name,
            arguments: arguments.into_iter().collect(),
        }
    }

    /// An atomic constant.
    #[must_use]
    pub fn atom(name: A) -> Self {
        Self {
            name,
            arguments: Vec::new(),
        }
    }

    /// A compound term whose arguments are all literal terms.
    #[must_use]
    pub fn compound(name: A, arguments: impl IntoIterator<Item = Term<A>>) -> Self {
        Self::new(name, arguments.into_iter().map(Slot::Literal))
    }

    /// The name of the term.
    #[must_use]
    pub fn name(&self) -> &A {
        &self.name
    }

    /// The arguments of the term.
    #[must_use]
    pub fn arguments(&self) -> &[Slot<Term<A>>] {
        &self.arguments
    }

    /// The number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// The `(name, arity)` signature.
    #[must_use]
    pub fn functor(&self) -> Functor<A> {
        Functor::new(self.name.clone(), self.arity())
    }

    /// Unify two terms.
    ///
    /// Names and arities must match; arguments are then unified left to right, stopping at the
    /// first failure. Repoints made by earlier arguments are left on `trail`.
    ///
    /// # Errors
    ///
    /// [`UnificationError::NameMismatch`], [`UnificationError::ArityMismatch`], or the first
    /// argument conflict.
    pub fn unify(lhs: &Self, rhs: &Self, trail: &mut Trail<Self>) -> Result<()> {
        if lhs.name != rhs.name {
            return Err(UnificationError::name_mismatch(&lhs.name, &rhs.name));
        }
        if lhs.arity() != rhs.arity() {
            return Err(UnificationError::ArityMismatch {
                left: lhs.arity(),
                right: rhs.arity(),
            });
        }
        lhs.arguments
            .iter()
            .zip(&rhs.arguments)
            .try_for_each(|(left, right)| Slot::unify(left, right, trail))
    }

    /// Copy this term, renaming variables through `context`.
    #[must_use]
    pub fn copy_with(&self, context: &mut CopyContext<Self>) -> Self {
        Self {
            name: self.name.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|argument| argument.copy_with(context))
                .collect(),
        }
    }

    /// This term with every bound variable replaced by its value, recursively.
    ///
    /// Unbound variables are kept as they are. Without the occurs check a cyclic binding makes
    /// this diverge.
    #[must_use]
    pub fn resolved(&self) -> Self {
        Self {
            name: self.name.clone(),
            arguments: self
                .arguments
                .iter()
                .map(|argument| match argument {
                    Slot::Literal(term) => Slot::Literal(term.resolved()),
                    Slot::Variable(binding) => binding.with_value(|value| match value {
                        Some(term) => Slot::Literal(term.resolved()),
                        None => Slot::Variable(binding.clone()),
                    }),
                })
                .collect(),
        }
    }

    /// Whether no argument, at any depth, is an unbound variable.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.arguments
            .iter()
            .all(|argument| argument.with_value(|value| value.is_some_and(Self::is_ground)))
    }

    /// Every unbound variable reachable from this term, in first-occurrence order.
    #[must_use]
    pub fn variables(&self) -> Vec<Var<A>> {
        let mut found = Vec::new();
        self.collect_variables(&mut found);
        found
    }

    fn collect_variables(&self, found: &mut Vec<Var<A>>) {
        for argument in &self.arguments {
            match argument {
                Slot::Literal(term) => term.collect_variables(found),
                Slot::Variable(binding) => binding.with_value(|value| match value {
                    Some(term) => term.collect_variables(found),
                    None => {
                        if !found.iter().any(|seen| seen.is_bound_to(binding)) {
                            found.push(binding.clone());
                        }
                    }
                }),
            }
        }
    }
}

impl<A: Atom> Unifiable for Term<A> {
    fn unify_values(lhs: &Self, rhs: &Self, trail: &mut Trail<Self>) -> Result<()> {
        Self::unify(lhs, rhs, trail)
    }

    fn copy_with(&self, context: &mut CopyContext<Self>) -> Self {
        Term::copy_with(self, context)
    }

    fn contains(&self, binding: &Binding<Self>) -> bool {
        self.arguments
            .iter()
            .any(|argument| argument.contains(binding))
    }
}

/// Same name, same arity and pairwise equal arguments, looking through variables.
impl<A: Atom> PartialEq for Term<A> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arguments == other.arguments
    }
}

impl<A: Atom> From<Term<A>> for Slot<Term<A>> {
    fn from(term: Term<A>) -> Self {
        Slot::Literal(term)
    }
}

impl<A: fmt::Debug> fmt::Debug for Term<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.name)?;
        if self.arguments.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument:?}")?;
        }
        f.write_str(")")
    }
}

impl<A: fmt::Display> fmt::Display for Term<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.arguments.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str(")")
    }
}
