//! # Axiomlog
//!
//! A small Prolog-style logic engine: terms, unification over shared logic variables, and
//! depth-first SLD resolution with backtracking.
//!
//! ## Features
//!
//! - Identity-based logic variables grouped into equivalence classes, with O(1) snapshots
//! - Structural unification of nested terms (optional occurs check)
//! - Clauses indexed by `(name, arity)`, enumerated in declaration order
//! - Early termination from the match callback via [`ControlFlow::Break`](std::ops::ControlFlow)
//!
//! ## Example
//!
//! ```rust
//! use axiomlog::{Clause, Slot, System, Term, Var};
//!
//! let lit = |name: &'static str| Slot::Literal(Term::atom(name));
//! let system = System::new([
//!     Clause::fact(Term::new("male", [lit("matt")])),
//!     Clause::fact(Term::new("parent", [lit("matt"), lit("jaden")])),
//!     Clause::fact(Term::new("parent", [lit("matt"), lit("kiley")])),
//!     // father(P, C) :- male(P), parent(P, C).
//!     Clause::with_vars(|[p, c]| {
//!         (
//!             Term::new("father", [Slot::var(&p), Slot::var(&c)]),
//!             vec![
//!                 Term::new("male", [Slot::var(&p)]),
//!                 Term::new("parent", [Slot::var(&p), Slot::var(&c)]),
//!             ],
//!         )
//!     }),
//! ]);
//!
//! let child = Var::new();
//! let goal = Term::new("father", [lit("matt"), Slot::var(&child)]);
//! let children = system.find_all(&[goal], || child.value().map(|t| *t.name()));
//! assert_eq!(children, vec![Some("jaden"), Some("kiley")]);
//! ```

/// Logic variables, glue records, snapshots and the undo trail.
pub mod binding;
/// Clauses and their scoped builders.
pub mod clause;
/// Renaming of variables when copying structures.
pub mod copy;
/// Resolution engine.
pub mod engine;
/// Unification errors.
pub mod error;
/// Unification cells and the payload trait.
pub mod slot;
/// Terms and functors.
pub mod term;

pub use binding::{Binding, Snapshot, Trail};
pub use clause::Clause;
pub use copy::CopyContext;
pub use engine::{Enumeration, SolverOptions, System};
pub use error::UnificationError;
pub use slot::{Slot, Unifiable};
pub use term::{Atom, Functor, Term, Var};
