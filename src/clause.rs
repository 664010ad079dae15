use crate::binding::Binding;
use crate::copy::CopyContext;
use crate::term::{Atom, Functor, Term, Var};
use std::fmt;

/// A statement whose `head` holds whenever every term of its `body` holds.
///
/// A clause with an empty body is a fact, e.g. `parent(matt, kiley).`; otherwise it is a rule,
/// e.g. `grandparent(A, B) :- parent(A, X), parent(X, B).`
///
/// Variables inside a stored clause are never bound by a query: the engine always works on a
/// fresh [`instantiate`](Clause::instantiate)d copy.
#[derive(Clone)]
pub struct Clause<A> {
    head: Term<A>,
    body: Vec<Term<A>>,
}

impl<A: Atom> Clause<A> {
    /// An unconditional truth.
    #[must_use]
    pub fn fact(head: Term<A>) -> Self {
        Self {
            head,
            body: Vec::new(),
        }
    }

    /// A truth conditional on every term in `body`.
    #[must_use]
    pub fn rule(head: Term<A>, body: impl IntoIterator<Item = Term<A>>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Build a clause over `count` fresh variables private to it.
    ///
    /// `build` may return a [`Term`] (a fact) or a `(head, body)` pair (a rule).
    ///
    /// ```rust
    /// use axiomlog::{Clause, Slot, Term};
    ///
    /// // father(P, C) :- male(P), parent(P, C).
    /// let father = Clause::scoped(2, |vars| {
    ///     let (p, c) = (&vars[0], &vars[1]);
    ///     (
    ///         Term::new("father", [Slot::var(p), Slot::var(c)]),
    ///         vec![
    ///             Term::new("male", [Slot::var(p)]),
    ///             Term::new("parent", [Slot::var(p), Slot::var(c)]),
    ///         ],
    ///     )
    /// });
    /// assert_eq!(father.body().len(), 2);
    /// ```
    pub fn scoped<R>(count: usize, build: impl FnOnce(&[Var<A>]) -> R) -> Self
    where
        R: Into<Self>,
    {
        let vars: Vec<Var<A>> = (0..count).map(|_| Binding::new()).collect();
        build(&vars).into()
    }

    /// Like [`scoped`](Clause::scoped), with the variable count fixed by the closure's pattern.
    ///
    /// ```rust
    /// use axiomlog::{Clause, Slot, Term};
    ///
    /// // test(test(A)) :- test(A).
    /// let clause = Clause::with_vars(|[a]| {
    ///     (
    ///         Term::new("test", [Slot::Literal(Term::new("test", [Slot::var(&a)]))]),
    ///         vec![Term::new("test", [Slot::var(&a)])],
    ///     )
    /// });
    /// assert!(!clause.is_fact());
    /// ```
    pub fn with_vars<const N: usize, R>(build: impl FnOnce([Var<A>; N]) -> R) -> Self
    where
        R: Into<Self>,
    {
        build(std::array::from_fn(|_| Binding::new())).into()
    }

    /// The conclusion.
    #[must_use]
    pub fn head(&self) -> &Term<A> {
        &self.head
    }

    /// The conditions, in the order they are proved.
    #[must_use]
    pub fn body(&self) -> &[Term<A>] {
        &self.body
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Signature of the head, the key this clause is indexed under.
    #[must_use]
    pub fn functor(&self) -> Functor<A> {
        self.head.functor()
    }

    /// Copy head and body through one shared `context`.
    #[must_use]
    pub fn copy_with(&self, context: &mut CopyContext<Term<A>>) -> Self {
        Self {
            head: self.head.copy_with(context),
            body: self
                .body
                .iter()
                .map(|term| term.copy_with(context))
                .collect(),
        }
    }

    /// A private copy with fresh variables, linked to nothing else.
    #[must_use]
    pub fn instantiate(&self) -> Self {
        self.copy_with(&mut CopyContext::new())
    }
}

impl<A: Atom> From<Term<A>> for Clause<A> {
    fn from(head: Term<A>) -> Self {
        Self::fact(head)
    }
}

impl<A: Atom> From<(Term<A>, Vec<Term<A>>)> for Clause<A> {
    fn from((head, body): (Term<A>, Vec<Term<A>>)) -> Self {
        Self::rule(head, body)
    }
}

impl<A: fmt::Debug> fmt::Debug for Clause<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.head)?;
        for (i, term) in self.body.iter().enumerate() {
            f.write_str(if i == 0 { " :- " } else { ", " })?;
            write!(f, "{term:?}")?;
        }
        f.write_str(".")
    }
}

impl<A: fmt::Display> fmt::Display for Clause<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (i, term) in self.body.iter().enumerate() {
            f.write_str(if i == 0 { " :- " } else { ", " })?;
            write!(f, "{term}")?;
        }
        f.write_str(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Slot;

    fn grandparent() -> Clause<&'static str> {
        Clause::with_vars(|[a, b, x]| {
            (
                Term::new("grandparent", [Slot::var(&a), Slot::var(&b)]),
                vec![
                    Term::new("parent", [Slot::var(&a), Slot::var(&x)]),
                    Term::new("parent", [Slot::var(&x), Slot::var(&b)]),
                ],
            )
        })
    }

    fn variable_at(term: &Term<&'static str>, index: usize) -> Var<&'static str> {
        term.arguments()[index]
            .as_variable()
            .cloned()
            .expect("argument should be a variable")
    }

    #[test]
    fn test_fact_from_builder() {
        let clause = Clause::with_vars(|[a]| Term::new("id", [Slot::var(&a), Slot::var(&a)]));
        assert!(clause.is_fact());
        assert_eq!(clause.functor(), Functor::new("id", 2));
    }

    #[test]
    fn test_scoped_builder_allocates_distinct_variables() {
        let clause = Clause::scoped(3, |vars| {
            assert_eq!(vars.len(), 3);
            assert_ne!(vars[0], vars[1]);
            Term::new("triple", vars.iter().map(Slot::var))
        });
        assert_eq!(clause.head().arity(), 3);
    }

    #[test]
    fn test_builders_do_not_share_variables() {
        let first = grandparent();
        let second = grandparent();
        assert_ne!(
            variable_at(first.head(), 0),
            variable_at(second.head(), 0),
            "Each clause gets its own variables"
        );
    }

    #[test]
    fn test_instantiate_is_independent() {
        let clause = grandparent();
        let one = clause.instantiate();
        let two = clause.instantiate();

        let original = variable_at(clause.head(), 0);
        let (a1, a2) = (variable_at(one.head(), 0), variable_at(two.head(), 0));
        assert_ne!(a1, original);
        assert_ne!(a1, a2);
        assert!(!a1.is_bound_to(&a2));
    }

    #[test]
    fn test_instantiate_preserves_head_body_sharing() {
        let copy = grandparent().instantiate();

        assert_eq!(variable_at(copy.head(), 0), variable_at(&copy.body()[0], 0));
        assert_eq!(variable_at(&copy.body()[0], 1), variable_at(&copy.body()[1], 0));
        assert_eq!(variable_at(copy.head(), 1), variable_at(&copy.body()[1], 1));
    }

    #[test]
    fn test_display() {
        let fact = Clause::fact(Term::compound("parent", [Term::atom("matt"), Term::atom("kiley")]));
        assert_eq!(fact.to_string(), "parent(matt, kiley).");

        let rule = Clause::rule(
            Term::atom("happy"),
            [Term::atom("sunny"), Term::atom("warm")],
        );
        assert_eq!(rule.to_string(), "happy :- sunny, warm.");
    }
}
