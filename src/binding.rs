use crate::error::{Result, UnificationError};
use crate::slot::Unifiable;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// An equivalence class of bindings together with the value they share.
///
/// A glue is never mutated once it holds a value; changing what a set of bindings denotes
/// allocates a new glue and repoints every member to it. Only the member set changes in place.
pub(crate) struct Glue<V> {
    id: u64,
    value: Option<V>,
    members: RefCell<IndexMap<u64, Weak<Cell<V>>>>,
}

impl<V> Glue<V> {
    fn new(value: Option<V>) -> Rc<Self> {
        Rc::new(Self {
            id: next_id(),
            value,
            members: RefCell::default(),
        })
    }

    /// Live members; entries whose binding has been dropped are skipped.
    fn members(&self) -> Vec<Binding<V>> {
        self.members
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .map(Binding)
            .collect()
    }
}

struct Cell<V> {
    id: u64,
    glue: RefCell<Rc<Glue<V>>>,
}

/// A logic variable.
///
/// Bindings are compared and hashed by identity only. Every binding delegates to exactly one
/// glue record; bindings that share a glue are "bound together" and observe the same value.
pub struct Binding<V>(Rc<Cell<V>>);

impl<V> Binding<V> {
    /// Create an unbound variable in a class of its own.
    #[must_use]
    pub fn new() -> Self {
        let cell = Rc::new(Cell {
            id: next_id(),
            glue: RefCell::new(Glue::new(None)),
        });
        cell.glue
            .borrow()
            .members
            .borrow_mut()
            .insert(cell.id, Rc::downgrade(&cell));
        Self(cell)
    }

    /// Identity of this variable, unique for the lifetime of the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Whether the equivalence class of this variable holds a value.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.0.glue.borrow().value.is_some()
    }

    /// Whether `self` and `other` currently delegate to the same glue.
    #[must_use]
    pub fn is_bound_to(&self, other: &Self) -> bool {
        Rc::ptr_eq(&*self.0.glue.borrow(), &*other.0.glue.borrow())
    }

    /// Identity of the equivalence class this variable currently belongs to.
    pub(crate) fn class_id(&self) -> u64 {
        self.0.glue.borrow().id
    }

    /// Capture the current delegation of this variable. O(1).
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<V> {
        Snapshot(self.glue())
    }

    /// Point this variable back at the glue captured in `snapshot`. O(1).
    ///
    /// Only this variable's own delegation changes; other members of either class are left
    /// where they are.
    pub fn restore(&self, snapshot: &Snapshot<V>) {
        self.set_glue(Rc::clone(&snapshot.0));
    }

    fn glue(&self) -> Rc<Glue<V>> {
        Rc::clone(&*self.0.glue.borrow())
    }

    fn set_glue(&self, glue: Rc<Glue<V>>) -> Rc<Glue<V>> {
        let previous = std::mem::replace(&mut *self.0.glue.borrow_mut(), glue);
        previous.members.borrow_mut().shift_remove(&self.0.id);
        self.0
            .glue
            .borrow()
            .members
            .borrow_mut()
            .insert(self.0.id, Rc::downgrade(&self.0));
        previous
    }

    fn repoint(&self, glue: &Rc<Glue<V>>, trail: &mut Trail<V>) {
        let previous = self.set_glue(Rc::clone(glue));
        trail.entries.push((self.clone(), previous));
    }
}

impl<V: Clone> Binding<V> {
    /// The value shared by this variable's class, if any.
    #[must_use]
    pub fn value(&self) -> Option<V> {
        self.0.glue.borrow().value.clone()
    }
}

impl<V> Binding<V> {
    /// Run `f` on the class's value without cloning it.
    ///
    /// `f` may unify or bind freely: it sees the glue current at the time of the call.
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&V>) -> R) -> R {
        let glue = self.glue();
        f(glue.value.as_ref())
    }
}

impl<V: Unifiable> Binding<V> {
    /// Bind this variable's whole class to `value`.
    ///
    /// An unbound class moves to a fresh glue holding `value`. A bound class unifies its value
    /// with `value` (plain equality for atomic payloads). On failure no member is repointed.
    ///
    /// # Errors
    ///
    /// Returns [`UnificationError::Conflict`] (or a structural mismatch for compound payloads)
    /// when the class already holds an incompatible value, and [`UnificationError::Occurs`]
    /// when the occurs check is enabled on `trail` and `value` contains this variable.
    pub fn resolve(&self, value: V, trail: &mut Trail<V>) -> Result<()> {
        let glue = self.glue();
        if let Some(current) = &glue.value {
            return Self::unify_or_undo(current, &value, trail);
        }
        Self::check_occurs(self, &value, trail)?;
        Self::commit(&[&glue], Some(value), trail);
        Ok(())
    }

    /// Merge the classes of `self` and `other`.
    ///
    /// The merged value is computed before anything is repointed, so a conflict leaves both
    /// classes exactly as they were.
    ///
    /// # Errors
    ///
    /// Returns an error when both classes hold values that do not unify, or when the occurs
    /// check is enabled and the surviving value contains the other class.
    pub fn bind(&self, other: &Self, trail: &mut Trail<V>) -> Result<()> {
        let (lhs, rhs) = (self.glue(), other.glue());
        if Rc::ptr_eq(&lhs, &rhs) {
            return Ok(());
        }

        let merged = match (&lhs.value, &rhs.value) {
            (None, None) => None,
            (Some(value), None) => {
                Self::check_occurs(other, value, trail)?;
                Some(value.clone())
            }
            (None, Some(value)) => {
                Self::check_occurs(self, value, trail)?;
                Some(value.clone())
            }
            (Some(left), Some(right)) => {
                Self::unify_or_undo(left, right, trail)?;
                Some(left.clone())
            }
        };

        // Unifying two structured values may already have moved either class.
        let (lhs, rhs) = (self.glue(), other.glue());
        if Rc::ptr_eq(&lhs, &rhs) {
            return Ok(());
        }
        Self::commit(&[&lhs, &rhs], merged, trail);
        Ok(())
    }

    /// Unify two values, rolling back any nested binding it made if it fails part way.
    fn unify_or_undo(lhs: &V, rhs: &V, trail: &mut Trail<V>) -> Result<()> {
        let mark = trail.mark();
        V::unify_values(lhs, rhs, trail).map_err(|err| {
            trail.undo_to(mark);
            err
        })
    }

    fn check_occurs(variable: &Self, value: &V, trail: &Trail<V>) -> Result<()> {
        if trail.occurs_check() && value.contains(variable) {
            return Err(UnificationError::occurs(variable, value));
        }
        Ok(())
    }

    fn commit(glues: &[&Rc<Glue<V>>], value: Option<V>, trail: &mut Trail<V>) {
        let merged = Glue::new(value);
        let members: Vec<Binding<V>> = glues.iter().flat_map(|glue| glue.members()).collect();
        for member in &members {
            member.repoint(&merged, trail);
        }
    }
}

impl<V> Clone for Binding<V> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<V> Default for Binding<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PartialEq for Binding<V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<V> Eq for Binding<V> {}

impl<V> Hash for Binding<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl<V: fmt::Debug> fmt::Debug for Binding<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.glue.borrow().value {
            Some(value) => write!(f, "{value:?}"),
            None => write!(f, "_G{}", self.0.id),
        }
    }
}

impl<V: fmt::Display> fmt::Display for Binding<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.glue.borrow().value {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "_G{}", self.0.id),
        }
    }
}

/// Opaque token for [`Binding::restore`].
pub struct Snapshot<V>(Rc<Glue<V>>);

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<V> fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snapshot").field(&self.0.id).finish()
    }
}

/// Undo log of every repoint performed during unification.
///
/// The resolution engine takes a [`mark`](Trail::mark) before each clause attempt and
/// [`undo_to`](Trail::undo_to) it afterwards; entries are replayed newest first, so every
/// touched variable returns to the glue it had at the mark.
pub struct Trail<V> {
    entries: SmallVec<[(Binding<V>, Rc<Glue<V>>); 8]>,
    occurs_check: bool,
}

impl<V> Trail<V> {
    /// An empty trail with the occurs check disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_occurs_check(false)
    }

    /// An empty trail, optionally rejecting cyclic bindings.
    #[must_use]
    pub fn with_occurs_check(occurs_check: bool) -> Self {
        Self {
            entries: SmallVec::new(),
            occurs_check,
        }
    }

    /// Whether unification through this trail performs the occurs check.
    #[must_use]
    pub fn occurs_check(&self) -> bool {
        self.occurs_check
    }

    /// Current undo point.
    #[must_use]
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Number of recorded repoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded since creation (or the last full undo).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every variable repointed since `mark`, newest first.
    pub fn undo_to(&mut self, mark: usize) {
        while self.entries.len() > mark {
            if let Some((binding, previous)) = self.entries.pop() {
                binding.set_glue(previous);
            }
        }
    }
}

impl<V> Default for Trail<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Trail<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trail")
            .field("len", &self.entries.len())
            .field("occurs_check", &self.occurs_check)
            .finish()
    }
}
