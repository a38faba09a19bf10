use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::errors;
use crate::hamt::PersistentMap;

/// Extra stack reserved before each recursive descent into a term, so deep
/// inputs don't blow the thread stack. Matches nanoda's use of `stacker`
/// around its own deep `Expr` traversals.
const STACK_RED_ZONE : usize = 256 * 1024;
const STACK_GROWTH : usize = 4 * 1024 * 1024;

fn grow<R>(f : impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, f)
}

/// Which name scheme a `Var` payload uses. External terms (parser output,
/// printer input, a finished reduction) are always `Index`; the machine
/// works internally in `Unique` once a term has gone through `to_unique`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Regime {
    /// de Bruijn index: counts binders between the variable and its binder.
    Index,
    /// globally unique, Barendregt-style integer name assigned by `NameGen`.
    Unique,
}

/// Injectable fresh-name counter, generalizing nanoda's process-wide
/// `LOCAL_SERIAL: AtomicU64` into a value tests can reset deterministically.
pub struct NameGen {
    next : u64,
}

impl NameGen {
    pub fn new() -> Self {
        // matches original_source's `0x4242` starting point for its static
        // name_generator(); kept only as a familiar-looking seed, not load-bearing.
        NameGen { next : 0x4242 }
    }

    pub fn fresh(&mut self) -> u64 {
        let n = self.next;
        self.next += 1;
        n
    }
}

impl Default for NameGen {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot memoization cell: starts `Todo` holding an unevaluated closure,
/// is mutated to `Done` exactly once by transition rule 5, and every
/// `Closure`/`Cache` node sharing the handle observes the same mutation.
/// `Rc<RefCell<_>>` rather than nanoda's `Arc<RwLock<_>>` because reduction
/// is single-threaded (no locking needed, matching the original C `struct
/// box`, which is itself unsynchronized).
#[derive(Clone)]
pub struct BoxCell(Rc<RefCell<BoxState>>);

pub enum BoxState {
    /// Not yet forced. Holds the closure to evaluate once forced, or `None`
    /// for a box that hasn't even been given work yet.
    Todo(Option<Term>),
    Done(Term),
}

impl BoxCell {
    pub fn new_todo(pending : Option<Term>) -> Self {
        BoxCell(Rc::new(RefCell::new(BoxState::Todo(pending))))
    }

    pub fn new_done(term : Term) -> Self {
        BoxCell(Rc::new(RefCell::new(BoxState::Done(term))))
    }

    pub fn is_done(&self) -> bool {
        matches!(&*self.0.borrow(), BoxState::Done(_))
    }

    /// Rule 3's precondition: a Todo box must hold a Closure to step into.
    /// Panics (fatal, invariant violation) if the box is Done or empty.
    pub fn todo_closure(&self) -> Term {
        match &*self.0.borrow() {
            BoxState::Todo(Some(t)) => t.clone(),
            other => errors::todo_box_not_closure(line!(), &DebugBoxState(other)),
        }
    }

    pub fn done_term(&self) -> Option<Term> {
        match &*self.0.borrow() {
            BoxState::Done(t) => Some(t.clone()),
            BoxState::Todo(_) => None,
        }
    }

    /// Rule 5's mutation: the box's one and only write.
    pub fn set_done(&self, term : Term) {
        *self.0.borrow_mut() = BoxState::Done(term);
    }

    pub fn ptr_eq(&self, other : &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct DebugBoxState<'a>(&'a BoxState);
impl<'a> fmt::Debug for DebugBoxState<'a> {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            BoxState::Todo(None) => write!(f, "Todo(empty)"),
            BoxState::Todo(Some(_)) => write!(f, "Todo(non-closure payload)"),
            BoxState::Done(_) => write!(f, "Done"),
        }
    }
}

/// Environment mapping names to memoized boxes, threaded through `Closure`
/// nodes. An alias kept mostly for readability at call sites.
pub type Env = PersistentMap<BoxCell>;

#[derive(Clone)]
pub struct Term(Rc<TermNode>);

pub enum TermNode {
    Var { regime : Regime, name : u64 },
    Abs { name : u64, body : Term },
    App { lhs : Term, rhs : Term },
    /// internal only: a not-yet-entered binder paired with the environment
    /// it closes over.
    Closure { body : Term, env : Env },
    /// internal only: a memoized slot paired with the payload last written
    /// to produce it (used for diagnostics and `duplicate`'s invariant check).
    Cache { slot : BoxCell, payload : Term },
}

impl Term {
    pub fn node(&self) -> &TermNode {
        &self.0
    }

    pub fn is_var(&self) -> bool {
        matches!(&*self.0, TermNode::Var { .. })
    }

    pub fn is_abs(&self) -> bool {
        matches!(&*self.0, TermNode::Abs { .. })
    }

    pub fn is_app(&self) -> bool {
        matches!(&*self.0, TermNode::App { .. })
    }

    pub fn is_closure(&self) -> bool {
        matches!(&*self.0, TermNode::Closure { .. })
    }

    pub fn is_cache(&self) -> bool {
        matches!(&*self.0, TermNode::Cache { .. })
    }

    pub fn ptr_eq(&self, other : &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        match &*self.0 {
            TermNode::Var { regime, name } => write!(f, "Var({:?}, {})", regime, name),
            TermNode::Abs { name, body } => write!(f, "Abs({}, {:?})", name, body),
            TermNode::App { lhs, rhs } => write!(f, "App({:?}, {:?})", lhs, rhs),
            TermNode::Closure { body, .. } => write!(f, "Closure({:?}, <env>)", body),
            TermNode::Cache { slot, .. } => write!(f, "Cache(done={})", slot.is_done()),
        }
    }
}

pub fn mk_var(regime : Regime, name : u64) -> Term {
    Term(Rc::new(TermNode::Var { regime, name }))
}

pub fn mk_abs(name : u64, body : Term) -> Term {
    Term(Rc::new(TermNode::Abs { name, body }))
}

pub fn mk_app(lhs : Term, rhs : Term) -> Term {
    Term(Rc::new(TermNode::App { lhs, rhs }))
}

pub fn mk_closure(body : Term, env : Env) -> Term {
    Term(Rc::new(TermNode::Closure { body, env }))
}

pub fn mk_cache(slot : BoxCell, payload : Term) -> Term {
    Term(Rc::new(TermNode::Cache { slot, payload }))
}

/// Deep-copies a finished, external (`Var`/`Abs`/`App`-only) term. Aborts
/// if a `Closure`/`Cache` node survived into what's supposed to be a normal
/// form -- that's the invariant violation spec.md calls "impure".
///
/// Implemented as an explicit work stack rather than direct recursion,
/// since this runs once per reduction on the final result and spec.md §9
/// flags it specifically as a place to avoid unbounded native recursion.
pub fn duplicate(term : &Term) -> Term {
    enum Work {
        Visit(Term),
        BuildAbs(u64),
        BuildApp,
    }
    let mut work = vec![Work::Visit(term.clone())];
    let mut results : Vec<Term> = Vec::new();
    while let Some(w) = work.pop() {
        match w {
            Work::Visit(t) => match &*t.0 {
                TermNode::Var { regime, name } => results.push(mk_var(*regime, *name)),
                TermNode::Abs { name, body } => {
                    work.push(Work::BuildAbs(*name));
                    work.push(Work::Visit(body.clone()));
                }
                TermNode::App { lhs, rhs } => {
                    work.push(Work::BuildApp);
                    work.push(Work::Visit(rhs.clone()));
                    work.push(Work::Visit(lhs.clone()));
                }
                TermNode::Closure { .. } | TermNode::Cache { .. } => {
                    errors::impure_normal_form(line!(), &t);
                }
            },
            Work::BuildAbs(name) => {
                let body = results.pop().expect("duplicate: missing Abs body result");
                results.push(mk_abs(name, body));
            }
            Work::BuildApp => {
                let rhs = results.pop().expect("duplicate: missing App rhs result");
                let lhs = results.pop().expect("duplicate: missing App lhs result");
                results.push(mk_app(lhs, rhs));
            }
        }
    }
    results.pop().expect("duplicate: empty result")
}

/// Structural equality up to bound-variable naming. Both terms must be in
/// `Index` regime; mixing regimes is a caller bug, not a recoverable one.
pub fn alpha_equivalent(a : &Term, b : &Term) -> bool {
    grow(|| alpha_equivalent_rec(a, b))
}

fn alpha_equivalent_rec(a : &Term, b : &Term) -> bool {
    match (&*a.0, &*b.0) {
        (TermNode::Var { regime : ra, name : na }, TermNode::Var { regime : rb, name : nb }) => {
            if *ra != Regime::Index || *rb != Regime::Index {
                errors::alpha_equiv_wrong_regime(line!());
            }
            na == nb
        }
        (TermNode::Abs { body : ba, .. }, TermNode::Abs { body : bb, .. }) => alpha_equivalent_rec(ba, bb),
        (TermNode::App { lhs : la, rhs : ra }, TermNode::App { lhs : lb, rhs : rb }) => {
            alpha_equivalent_rec(la, lb) && alpha_equivalent_rec(ra, rb)
        }
        _ => false,
    }
}

/// Converts a de Bruijn (`Index`) term to the machine's internal globally
/// unique (`Unique`) naming, assigning a fresh name per binder from `gen`.
/// An index with no enclosing binder is unbound: reported via
/// `errors::unbound_index` and patched with a fresh name rather than
/// aborting, matching spec.md §7's recoverable-diagnostic policy.
pub fn to_unique(term : &Term, gen : &mut NameGen) -> Term {
    grow(|| to_unique_rec(term, &mut Vec::new(), gen))
}

fn to_unique_rec(term : &Term, scope : &mut Vec<u64>, gen : &mut NameGen) -> Term {
    match &*term.0 {
        TermNode::Var { regime : Regime::Unique, name } => mk_var(Regime::Unique, *name),
        TermNode::Var { regime : Regime::Index, name } => {
            let idx = *name as usize;
            if idx < scope.len() {
                let resolved = scope[scope.len() - idx - 1];
                mk_var(Regime::Unique, resolved)
            } else {
                errors::unbound_index(line!(), idx, scope.len());
                mk_var(Regime::Unique, gen.fresh())
            }
        }
        TermNode::Abs { body, .. } => {
            let fresh = gen.fresh();
            scope.push(fresh);
            let body = to_unique_rec(body, scope, gen);
            scope.pop();
            mk_abs(fresh, body)
        }
        TermNode::App { lhs, rhs } => {
            let lhs = to_unique_rec(lhs, scope, gen);
            let rhs = to_unique_rec(rhs, scope, gen);
            mk_app(lhs, rhs)
        }
        TermNode::Closure { .. } | TermNode::Cache { .. } => errors::impure_normal_form(line!(), term),
    }
}

/// Inverse of `to_unique`: converts a `Unique`-named term back to de Bruijn
/// indices. An unbound unique name (shouldn't occur for a well-formed
/// reduction result, but is not a machine invariant violation on its own)
/// is reported via `errors::unbound_name`; index 0 is substituted so the
/// conversion still produces a well-formed `Term` rather than panicking.
pub fn to_index(term : &Term) -> Term {
    grow(|| to_index_rec(term, &mut Vec::new()))
}

fn to_index_rec(term : &Term, scope : &mut Vec<u64>) -> Term {
    match &*term.0 {
        TermNode::Var { regime : Regime::Index, name } => mk_var(Regime::Index, *name),
        TermNode::Var { regime : Regime::Unique, name } => {
            match scope.iter().rposition(|bound| bound == name) {
                Some(pos) => mk_var(Regime::Index, (scope.len() - pos - 1) as u64),
                None => {
                    errors::unbound_name(line!(), *name);
                    mk_var(Regime::Index, 0)
                }
            }
        }
        TermNode::Abs { name, body } => {
            scope.push(*name);
            let body = to_index_rec(body, scope);
            scope.pop();
            mk_abs(0, body)
        }
        TermNode::App { lhs, rhs } => {
            let lhs = to_index_rec(lhs, scope);
            let rhs = to_index_rec(rhs, scope);
            mk_app(lhs, rhs)
        }
        TermNode::Closure { .. } | TermNode::Cache { .. } => errors::impure_normal_form(line!(), term),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn idx(n : u64) -> Term {
        mk_var(Regime::Index, n)
    }

    #[test]
    fn duplicate_preserves_structure() {
        // \x. x 0   (a self-application-looking closed term under one binder)
        let t = mk_abs(0, mk_app(idx(0), idx(0)));
        let d = duplicate(&t);
        assert!(alpha_equivalent(&t, &d));
        assert!(!t.ptr_eq(&d));
    }

    #[test]
    fn alpha_equivalent_ignores_binder_names_but_not_structure() {
        let id1 = mk_abs(0, idx(0));
        let id2 = mk_abs(0, idx(0));
        assert!(alpha_equivalent(&id1, &id2));

        let k = mk_abs(0, mk_abs(0, idx(1)));
        assert!(!alpha_equivalent(&id1, &k));
    }

    #[test]
    fn unique_then_index_round_trips() {
        // \x. \y. x (y x)
        let t = mk_abs(0, mk_abs(0, mk_app(idx(1), mk_app(idx(0), idx(1)))));
        let mut gen = NameGen::new();
        let unique = to_unique(&t, &mut gen);
        let back = to_index(&unique);
        assert!(alpha_equivalent(&t, &back));
    }

    #[test]
    fn to_unique_assigns_distinct_names_per_binder() {
        let t = mk_abs(0, mk_abs(0, idx(0)));
        let mut gen = NameGen::new();
        let unique = to_unique(&t, &mut gen);
        match unique.node() {
            TermNode::Abs { name : outer, body } => match body.node() {
                TermNode::Abs { name : inner, .. } => assert_ne!(outer, inner),
                _ => panic!("expected nested Abs"),
            },
            _ => panic!("expected Abs"),
        }
    }
}
