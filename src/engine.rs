use crate::binding::Trail;
use crate::clause::Clause;
use crate::copy::CopyContext;
use crate::term::{Atom, Functor, Term};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use smallvec::SmallVec;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::Rc;

/// Tunables for a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SolverOptions {
    /// Reject bindings that would make a term contain itself
    pub occurs_check: bool,
    /// Prune any proof path that nests more rule expansions than this. Goals of a conjunction
    /// share the depth of the body they came from.
    pub max_depth: Option<usize>,
}

#[cfg(feature = "serde")]
impl SolverOptions {
    /// Parse options from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// How a call to [`System::enumerate_matches`] ended.
///
/// Finding no match at all is an ordinary `Exhausted { matches: 0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enumeration {
    /// Every alternative was explored
    Exhausted {
        /// Number of times the callback ran
        matches: usize,
    },
    /// The callback asked to stop
    Stopped {
        /// Number of times the callback ran, including the one that stopped
        matches: usize,
    },
}

impl Enumeration {
    /// Number of solutions reported.
    #[must_use]
    pub fn matches(&self) -> usize {
        match *self {
            Self::Exhausted { matches } | Self::Stopped { matches } => matches,
        }
    }

    /// Whether the search was cut short by the callback.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }
}

/// Outcome of resolving one conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// No alternative succeeded
    Failed,
    /// At least one solution was reported and every alternative was explored
    Exhausted,
    /// The callback asked to stop
    Stopped,
}

/// Goals still to prove, as a shared list so a rule body can be pushed in front of the
/// remaining conjunction without copying it.
struct Goals<A> {
    goal: Term<A>,
    /// Number of rule expansions enclosing this goal
    depth: usize,
    rest: GoalList<A>,
}

type GoalList<A> = Option<Rc<Goals<A>>>;

fn push_goals<A>(
    goals: impl DoubleEndedIterator<Item = Term<A>>,
    depth: usize,
    rest: GoalList<A>,
) -> GoalList<A> {
    goals
        .rev()
        .fold(rest, |rest, goal| Some(Rc::new(Goals { goal, depth, rest })))
}

/// A pending alternative: the first goal of `goals` and the candidates not yet tried for it.
struct ChoicePoint<'s, A> {
    goals: Rc<Goals<A>>,
    candidates: &'s [Clause<A>],
    next: usize,
    /// Trail length before any candidate of this point was tried
    mark: usize,
}

struct Search<A, F> {
    trail: Trail<Term<A>>,
    on_match: F,
    matches: usize,
}

impl<A, F> Search<A, F>
where
    F: FnMut() -> ControlFlow<()>,
{
    fn report(&mut self) -> Resolution {
        self.matches += 1;
        match (self.on_match)() {
            ControlFlow::Continue(()) => Resolution::Exhausted,
            ControlFlow::Break(()) => Resolution::Stopped,
        }
    }
}

/// A logic system: clauses grouped by head signature, queried by SLD resolution.
///
/// Within each signature, clauses are tried in the order they were added, and conjunctions are
/// proved left to right, so the order of solutions is fully determined by the program.
///
/// Variables are `Rc` handles, so a `System` and its queries live on one thread: it is neither
/// `Send` nor `Sync`. Queries may still be interleaved freely, each one undoing its own bindings.
#[derive(Debug)]
pub struct System<A> {
    clauses: IndexMap<Functor<A>, Vec<Clause<A>>>,
    options: SolverOptions,
}

impl<A: Atom> Default for System<A> {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<A: Atom> System<A> {
    /// Create a system from a collection of clauses
    pub fn new(clauses: impl IntoIterator<Item = Clause<A>>) -> Self {
        Self::with_options(clauses, SolverOptions::default())
    }

    /// Create a system with explicit solver options
    pub fn with_options(clauses: impl IntoIterator<Item = Clause<A>>, options: SolverOptions) -> Self {
        let mut system = Self {
            clauses: IndexMap::new(),
            options,
        };
        system.extend(clauses);
        system
    }

    /// Current solver options
    #[must_use]
    pub fn options(&self) -> SolverOptions {
        self.options
    }

    /// Replace the solver options
    pub fn set_options(&mut self, options: SolverOptions) {
        self.options = options;
    }

    /// Append a clause after every clause already declared for its signature
    pub fn add_clause(&mut self, clause: Clause<A>) {
        let functor = clause.functor();
        trace!("adding clause for {functor:?}");
        self.clauses.entry(functor).or_default().push(clause);
    }

    /// Clauses whose head has signature `functor`, in declaration order
    #[must_use]
    pub fn clauses_for(&self, functor: &Functor<A>) -> &[Clause<A>] {
        self.clauses
            .get(functor)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every signature with at least one clause, in first-declaration order
    pub fn functors(&self) -> impl Iterator<Item = &Functor<A>> {
        self.clauses.keys()
    }

    /// Every clause, grouped by signature
    pub fn clauses(&self) -> impl Iterator<Item = &Clause<A>> {
        self.clauses.values().flatten()
    }

    /// Total number of clauses
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.values().map(Vec::len).sum()
    }

    /// Whether no clause has been declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Prove every goal in `goals` simultaneously, calling `on_match` once per solution.
    ///
    /// During the callback the caller's own variables in `goals` observe the solution's
    /// bindings. Returning [`ControlFlow::Break`] stops the search. Either way every binding
    /// made by the search is undone before this returns.
    pub fn enumerate_matches<F>(&self, goals: &[Term<A>], on_match: F) -> Enumeration
    where
        F: FnMut() -> ControlFlow<()>,
    {
        debug!("enumerating matches for {} goal(s)", goals.len());
        let mut search = Search {
            trail: Trail::with_occurs_check(self.options.occurs_check),
            on_match,
            matches: 0,
        };

        let resolution = self.solve(goals, &mut search);
        let matches = search.matches;
        debug!("search {resolution:?} after {matches} match(es)");

        match resolution {
            Resolution::Stopped => Enumeration::Stopped { matches },
            Resolution::Failed | Resolution::Exhausted => Enumeration::Exhausted { matches },
        }
    }

    /// [`enumerate_matches`](System::enumerate_matches) for a single goal.
    pub fn enumerate_goal_matches<F>(&self, goal: &Term<A>, on_match: F) -> Enumeration
    where
        F: FnMut() -> ControlFlow<()>,
    {
        self.enumerate_matches(std::slice::from_ref(goal), on_match)
    }

    /// Whether `goals` has at least one solution. Stops at the first one.
    #[must_use]
    pub fn ask(&self, goals: &[Term<A>]) -> bool {
        self.enumerate_matches(goals, || ControlFlow::Break(()))
            .matches()
            > 0
    }

    /// Run `extract` on every solution of `goals` and collect what it returns.
    pub fn find_all<T>(&self, goals: &[Term<A>], mut extract: impl FnMut() -> T) -> Vec<T> {
        let mut found = Vec::new();
        self.enumerate_matches(goals, || {
            found.push(extract());
            ControlFlow::Continue(())
        });
        found
    }

    /// Depth-first, left-to-right resolution with chronological backtracking.
    ///
    /// Each choice point remembers the trail length it started from; undoing to that mark
    /// before trying the next candidate restores every variable the previous attempt touched,
    /// including variables of the caller's query.
    fn solve<F>(&self, goals: &[Term<A>], search: &mut Search<A, F>) -> Resolution
    where
        F: FnMut() -> ControlFlow<()>,
    {
        let base = search.trail.mark();
        let Some(first) = push_goals(goals.iter().cloned(), 0, None) else {
            return search.report();
        };

        let mut stack: SmallVec<[ChoicePoint<'_, A>; 16]> = SmallVec::new();
        stack.push(self.choice_point(first, base));
        let mut outcome = Resolution::Failed;

        while let Some(point) = stack.last_mut() {
            search.trail.undo_to(point.mark);
            let depth = point.goals.depth;
            let Some(rest) = Self::advance(point, &mut search.trail) else {
                trace!("exhausted alternatives at depth {depth}");
                stack.pop();
                continue;
            };

            match rest {
                None => {
                    if search.report() == Resolution::Stopped {
                        trace!("stopped at depth {depth}");
                        search.trail.undo_to(base);
                        return Resolution::Stopped;
                    }
                    outcome = Resolution::Exhausted;
                }
                Some(next) => {
                    if self.options.max_depth.is_some_and(|max| next.depth > max) {
                        warn!("pruning {:?}: depth limit {} exceeded", next.goal, next.depth);
                        continue;
                    }
                    let mark = search.trail.mark();
                    stack.push(self.choice_point(next, mark));
                }
            }
        }

        search.trail.undo_to(base);
        outcome
    }

    fn choice_point(&self, goals: Rc<Goals<A>>, mark: usize) -> ChoicePoint<'_, A> {
        let candidates = self.clauses_for(&goals.goal.functor());
        ChoicePoint {
            goals,
            candidates,
            next: 0,
            mark,
        }
    }

    /// Try the remaining candidates of `point` until one head unifies with its goal.
    ///
    /// Returns the goals left to prove after that candidate (its body, then the rest of the
    /// conjunction), or `None` once every candidate has been tried.
    fn advance(point: &mut ChoicePoint<'_, A>, trail: &mut Trail<Term<A>>) -> Option<GoalList<A>> {
        let goal = &point.goals.goal;
        while let Some(clause) = point.candidates.get(point.next) {
            point.next += 1;

            // One context per attempt keeps this copy's variables apart from every other
            // attempt at the same clause.
            let mut context = CopyContext::new();
            let head = clause.head().copy_with(&mut context);
            trace!("attempt {goal:?} against {head:?}");

            match Term::unify(goal, &head, trail) {
                Ok(()) => {
                    trace!("unified {goal:?}");
                    let body: Vec<Term<A>> = clause
                        .body()
                        .iter()
                        .map(|term| term.copy_with(&mut context))
                        .collect();
                    let depth = point.goals.depth + 1;
                    return Some(push_goals(body.into_iter(), depth, point.goals.rest.clone()));
                }
                Err(err) => {
                    trace!("backtracking: {err}");
                    trail.undo_to(point.mark);
                }
            }
        }
        None
    }
}

impl<A: Atom> Extend<Clause<A>> for System<A> {
    fn extend<I: IntoIterator<Item = Clause<A>>>(&mut self, clauses: I) {
        for clause in clauses {
            self.add_clause(clause);
        }
    }
}

impl<A: Atom> FromIterator<Clause<A>> for System<A> {
    fn from_iter<I: IntoIterator<Item = Clause<A>>>(clauses: I) -> Self {
        Self::new(clauses)
    }
}

impl<A: fmt::Display> fmt::Display for System<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for clause in self.clauses.values().flatten() {
            writeln!(f, "{clause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Slot;
    use crate::term::Var;

    type T = Term<&'static str>;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn atom(name: &'static str) -> Slot<T> {
        Slot::Literal(Term::atom(name))
    }

    fn fact(name: &'static str, args: &[&'static str]) -> Clause<&'static str> {
        Clause::fact(Term::new(name, args.iter().map(|arg| atom(*arg))))
    }

    fn name_of(var: &Var<&'static str>) -> Option<&'static str> {
        var.value().map(|term| *term.name())
    }

    fn family() -> System<&'static str> {
        System::new([
            fact("male", &["jaden"]),
            fact("male", &["matt"]),
            fact("female", &["tuesday"]),
            fact("female", &["kiley"]),
            // father(P, C) :- male(P), parent(P, C).
            Clause::with_vars(|[p, c]| {
                (
                    Term::new("father", [Slot::var(&p), Slot::var(&c)]),
                    vec![
                        Term::new("male", [Slot::var(&p)]),
                        Term::new("parent", [Slot::var(&p), Slot::var(&c)]),
                    ],
                )
            }),
            fact("parent", &["tuesday", "jaden"]),
            fact("parent", &["matt", "jaden"]),
            fact("parent", &["matt", "kiley"]),
            fact("parent", &["tuesday", "kiley"]),
        ])
    }

    #[test]
    fn test_single_fact_succeeds() {
        init_logging();
        let system = System::new([fact("jaden", &["cool"]), fact("swift", &["awesome"])]);

        let mut count = 0;
        let result = system.enumerate_goal_matches(&Term::new("swift", [atom("awesome")]), || {
            count += 1;
            ControlFlow::Continue(())
        });

        assert_eq!(count, 1);
        assert_eq!(result, Enumeration::Exhausted { matches: 1 });
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let system = System::new([fact("jaden", &["cool"]), fact("swift", &["awesome"])]);

        let result =
            system.enumerate_goal_matches(&Term::new("swift", [atom("uncool")]), || {
                panic!("No solution should be reported")
            });

        assert_eq!(result, Enumeration::Exhausted { matches: 0 });
        assert!(!result.is_stopped());
    }

    #[test]
    fn test_backtracks_past_failing_fact() {
        let system = System::new([fact("test", &["a", "0", "x"]), fact("test", &["a", "1", "y"])]);
        let (t, v) = (Var::new(), Var::new());
        let goal = Term::new("test", [Slot::var(&t), atom("1"), Slot::var(&v)]);

        let found = system.find_all(std::slice::from_ref(&goal), || (name_of(&t), name_of(&v)));
        assert_eq!(found, vec![(Some("a"), Some("y"))]);
    }

    #[test]
    fn test_rule_enumerates_in_declaration_order() {
        init_logging();
        let system = family();
        let child = Var::new();
        let goal = Term::new("father", [atom("matt"), Slot::var(&child)]);

        let children = system.find_all(&[goal], || name_of(&child));
        assert_eq!(children, vec![Some("jaden"), Some("kiley")]);
        assert_eq!(child.value(), None, "Bindings are undone after the search");
    }

    #[test]
    fn test_conjunction_shares_variables() {
        let system = family();
        let (mother, child) = (Var::new(), Var::new());
        let goals = [
            Term::new("female", [Slot::var(&mother)]),
            Term::new("parent", [Slot::var(&mother), Slot::var(&child)]),
        ];

        let pairs = system.find_all(&goals, || (name_of(&mother), name_of(&child)));
        assert_eq!(
            pairs,
            vec![
                (Some("tuesday"), Some("jaden")),
                (Some("tuesday"), Some("kiley")),
            ]
        );
    }

    #[test]
    fn test_empty_conjunction_is_trivially_true() {
        let system = family();
        let mut count = 0;
        let result = system.enumerate_matches(&[], || {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(count, 1);
        assert_eq!(result.matches(), 1);
    }

    #[test]
    fn test_stop_ends_search_and_undoes_bindings() {
        let system = family();
        let child = Var::new();
        let goal = Term::new("father", [atom("matt"), Slot::var(&child)]);

        let mut seen = Vec::new();
        let result = system.enumerate_goal_matches(&goal, || {
            seen.push(name_of(&child));
            ControlFlow::Break(())
        });

        assert_eq!(seen, vec![Some("jaden")]);
        assert_eq!(result, Enumeration::Stopped { matches: 1 });
        assert_eq!(child.value(), None);
    }

    #[test]
    fn test_unknown_functor_has_no_matches() {
        let system = family();
        let x = Var::new();
        let goal = Term::new("unknown", [Slot::var(&x)]);
        assert!(!system.ask(&[goal]));
    }

    #[test]
    fn test_arity_is_part_of_the_signature() {
        let system = System::new([fact("test", &["a", "0", "x"])]);
        let goal = Term::new("test", [atom("a"), atom("0")]);

        assert!(system.clauses_for(&goal.functor()).is_empty());
        assert!(!system.ask(&[goal]));
    }

    #[test]
    fn test_ask_stops_at_first_match() {
        let system = family();
        let someone = Var::new();
        assert!(system.ask(&[Term::new("male", [Slot::var(&someone)])]));
        assert!(!system.ask(&[Term::new("male", [atom("kiley")])]));
    }

    #[test]
    fn test_add_clause_appends_alternatives() {
        let mut system = family();
        let before = system.len();
        system.add_clause(fact("male", &["dennis"]));
        assert_eq!(system.len(), before + 1);

        let who = Var::new();
        let males = system.find_all(&[Term::new("male", [Slot::var(&who)])], || name_of(&who));
        assert_eq!(males, vec![Some("jaden"), Some("matt"), Some("dennis")]);
    }

    #[test]
    fn test_index_groups_by_functor() {
        let system = family();
        let functors: Vec<_> = system.functors().cloned().collect();
        assert_eq!(
            functors,
            vec![
                Functor::new("male", 1),
                Functor::new("female", 1),
                Functor::new("father", 2),
                Functor::new("parent", 2),
            ]
        );
        assert_eq!(system.clauses_for(&Functor::new("parent", 2)).len(), 4);
        assert_eq!(system.clauses().count(), system.len());
    }

    #[test]
    fn test_stored_clauses_are_never_bound() {
        let system = family();
        let child = Var::new();
        let goal = Term::new("father", [atom("matt"), Slot::var(&child)]);
        let _ = system.find_all(&[goal], || ());

        let rule = &system.clauses_for(&Functor::new("father", 2))[0];
        assert_eq!(rule.head().variables().len(), 2, "Rule variables stay unbound");
    }

    #[test]
    fn test_depth_limit_prunes_recursion() {
        init_logging();
        // nat(z). nat(s(N)) :- nat(N).
        let clauses = [
            fact("nat", &["z"]),
            Clause::with_vars(|[n]| {
                (
                    Term::new("nat", [Slot::Literal(Term::new("s", [Slot::var(&n)]))]),
                    vec![Term::new("nat", [Slot::var(&n)])],
                )
            }),
        ];
        let options = SolverOptions {
            max_depth: Some(3),
            ..SolverOptions::default()
        };
        let system = System::with_options(clauses, options);
        let x = Var::new();

        let result = system.enumerate_goal_matches(&Term::new("nat", [Slot::var(&x)]), || {
            ControlFlow::Continue(())
        });
        assert_eq!(result, Enumeration::Exhausted { matches: 4 });
    }

    #[test]
    fn test_depth_limit_ignores_flat_conjunctions() {
        let system = System::with_options(
            ["p", "q", "r", "s", "t"].map(|name| Clause::fact(Term::atom(name))),
            SolverOptions {
                max_depth: Some(0),
                ..SolverOptions::default()
            },
        );
        let goals = ["p", "q", "r", "s", "t"].map(Term::atom);

        let result = system.enumerate_matches(&goals, || ControlFlow::Continue(()));
        assert_eq!(
            result,
            Enumeration::Exhausted { matches: 1 },
            "Conjunctions of facts never nest"
        );
    }

    #[test]
    fn test_depth_limit_counts_rule_expansions() {
        // top :- mid, mid.  mid :- leaf.  leaf.
        let system = |max_depth: usize| {
            System::with_options(
                [
                    Clause::rule(Term::atom("top"), [Term::atom("mid"), Term::atom("mid")]),
                    Clause::rule(Term::atom("mid"), [Term::atom("leaf")]),
                    Clause::fact(Term::atom("leaf")),
                ],
                SolverOptions {
                    max_depth: Some(max_depth),
                    ..SolverOptions::default()
                },
            )
        };
        let goal = [Term::atom("top")];
        assert!(system(2).ask(&goal));
        assert!(!system(1).ask(&goal), "leaf sits two expansions below top");
    }

    #[test]
    fn test_query_inside_callback_shares_the_system() {
        let system = family();
        let (who, child) = (Var::new(), Var::new());
        let outer = Term::new("male", [Slot::var(&who)]);
        let inner = Term::new("parent", [Slot::var(&who), Slot::var(&child)]);

        let has_children = system.find_all(&[outer], || {
            (name_of(&who), system.ask(std::slice::from_ref(&inner)))
        });
        assert_eq!(has_children, vec![(Some("jaden"), false), (Some("matt"), true)]);
        assert_eq!(child.value(), None, "The inner query unwinds on its own");
    }

    #[test]
    fn test_occurs_check_option() {
        // same(X, X).
        let clauses = [Clause::with_vars(|[x]| {
            Term::new("same", [Slot::var(&x), Slot::var(&x)])
        })];
        let y = Var::new();
        let goal = Term::new("same", [Slot::var(&y), Slot::Literal(Term::new("f", [Slot::var(&y)]))]);

        let mut system = System::new(clauses);
        system.set_options(SolverOptions {
            occurs_check: true,
            ..system.options()
        });
        assert!(!system.ask(std::slice::from_ref(&goal)));
        assert_eq!(y.value(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_from_json() {
        let options = SolverOptions::from_json(r#"{ "max_depth": 8 }"#).expect("valid options");
        assert_eq!(options.max_depth, Some(8));
        assert!(!options.occurs_check, "Missing fields fall back to defaults");
        assert!(SolverOptions::from_json(r#"{ "occurs_check": "yes" }"#).is_err());
    }

    #[test]
    fn test_display_lists_clauses() {
        let system = System::new([
            fact("male", &["matt"]),
            Clause::rule(Term::atom("happy"), [Term::atom("sunny")]),
        ]);
        assert_eq!(system.to_string(), "male(matt).\nhappy :- sunny.\n");
    }
}
