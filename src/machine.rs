use crate::errors;
use crate::errors::{RknlErr, RknlResult};
use crate::term::{mk_abs, mk_app, mk_cache, mk_closure, mk_var, BoxCell, Env, NameGen, Regime, Term, TermNode};
use crate::trace::{Trace, TraceCookie};

/// A frame of the machine's ephemeral continuation stack. Named variants
/// replacing the reference machine's overloaded `Var(0)` sentinel holes
/// inside otherwise-ordinary `App`/`Abs` stack terms.
enum Frame {
    /// rule 1: an application's argument side, still unforced.
    AppArgHole(Term),
    /// rule 9: an application's function side, already reduced to a value.
    AppFnHole(Term),
    /// rule 7 / rule 11: the binder of an `Abs` being rebuilt once its body
    /// finishes reducing.
    AbsHole(u64),
    /// rule 3 / rule 5 / rule 7: a box awaiting its one-shot memoized write.
    CacheHole(BoxCell),
}

enum Configuration {
    /// "closure": actively evaluating `term` under `env`.
    E { term : Term, env : Env, stack : Vec<Frame> },
    /// "computed": `term` is a value; `stack` says what to do with it next.
    C { stack : Vec<Frame>, term : Term },
}

fn as_closure(t : &Term) -> Option<(Term, Env)> {
    match t.node() {
        TermNode::Closure { body, env } => Some((body.clone(), env.clone())),
        _ => None,
    }
}

/// If `t` is `Cache{slot, payload}` and `payload` is a `Closure` whose body
/// is an `Abs`, returns the slot plus that `Abs`'s name/body.
fn as_cache_of_abs_closure(t : &Term) -> Option<(BoxCell, u64, Term, Env)> {
    match t.node() {
        TermNode::Cache { slot, payload } => {
            let (body, env) = as_closure(payload)?;
            match body.node() {
                TermNode::Abs { name, body : abs_body } => Some((slot.clone(), *name, abs_body.clone(), env)),
                _ => None,
            }
        }
        _ => None,
    }
}

// rule 1: App(lhs, rhs) -- push the argument as an unforced closure, focus lhs.
fn transition_1(lhs : Term, rhs : Term, env : &Env, stack : &mut Vec<Frame>) -> Term {
    let pending = mk_closure(rhs, env.clone());
    stack.push(Frame::AppArgHole(pending));
    lhs
}

// rule 2: Abs -- wrap as a fresh, unforced memo cell; switch to C-mode.
fn transition_2(abs_term : Term, env : &Env) -> Term {
    let slot = BoxCell::new_todo(None);
    let closure = mk_closure(abs_term, env.clone());
    mk_cache(slot, closure)
}

// rule 3: Var bound to a Todo box -- force its closure, remembering to memoize.
fn transition_3(slot : BoxCell, stack : &mut Vec<Frame>) -> (Term, Env) {
    let pending = slot.todo_closure();
    let (body, env) = as_closure(&pending).unwrap_or_else(|| errors::todo_box_not_closure(line!(), &pending));
    stack.push(Frame::CacheHole(slot));
    (body, env)
}

// rule 4: Var bound to a Done box -- already a value.
fn transition_4(slot : &BoxCell) -> Term {
    slot.done_term().expect("transition_4 requires a Done box")
}

// rule 5: top of stack is the memo frame for the value we just computed.
fn transition_5(slot : BoxCell, term : Term) -> Term {
    slot.set_done(term.clone());
    term
}

// rule 6: applying a now-reduced Abs to a still-unforced argument: extend
// the captured environment and continue into the body.
fn transition_6(pending_arg : Term, abs_name : u64, abs_body : Term, closure_env : Env) -> (Term, Env) {
    let arg_slot = BoxCell::new_todo(Some(pending_arg));
    let extended = closure_env.set(abs_name, arg_slot);
    (abs_body, extended)
}

// rule 7: reducing under a binder with no pending argument -- eta-expand the
// formal parameter into a fresh generic variable and push the two frames
// that will rebuild `Abs` and memoize its result once the body is done.
fn transition_7(slot : BoxCell, abs_name : u64, abs_body : Term, closure_env : Env, stack : &mut Vec<Frame>, gen : &mut NameGen) -> (Term, Env) {
    let fresh = gen.fresh();
    let var_slot = BoxCell::new_done(mk_var(Regime::Unique, fresh));
    let extended = closure_env.set(abs_name, var_slot);
    stack.push(Frame::CacheHole(slot));
    stack.push(Frame::AbsHole(fresh));
    (abs_body, extended)
}

// rule 8: an Abs whose box was already forced (by an earlier rule 7).
fn transition_8(slot : &BoxCell) -> Term {
    slot.done_term().expect("transition_8 requires a Done box")
}

// rule 9: applying a stuck (non-Abs) value to a still-unforced argument:
// swap focus to the argument, remembering the function side.
fn transition_9(fn_value : Term, pending_arg : Term, stack : &mut Vec<Frame>) -> (Term, Env) {
    let (body, env) = as_closure(&pending_arg).unwrap_or_else(|| errors::todo_box_not_closure(line!(), &pending_arg));
    stack.push(Frame::AppFnHole(fn_value));
    (body, env)
}

// rule 10: the argument side of a stuck application just finished reducing.
fn transition_10(fn_value : Term, arg_value : Term) -> Term {
    mk_app(fn_value, arg_value)
}

// rule 11: an Abs body just finished reducing; rebuild the binder.
fn transition_11(name : u64, body : Term) -> Term {
    mk_abs(name, body)
}

/// Dispatches one E-mode ("closure") step. `term` must be `Var`/`Abs`/`App`;
/// anything else surfacing here is the invariant violation spec.md names.
fn step_closure(term : Term, env : Env, mut stack : Vec<Frame>) -> (Configuration, char) {
    match term.node() {
        TermNode::App { lhs, rhs } => {
            let (lhs, rhs) = (lhs.clone(), rhs.clone());
            let new_term = transition_1(lhs, rhs, &env, &mut stack);
            (Configuration::E { term : new_term, env, stack }, '1')
        }
        TermNode::Abs { .. } => {
            let new_term = transition_2(term.clone(), &env);
            (Configuration::C { stack, term : new_term }, '2')
        }
        TermNode::Var { name, .. } => {
            let slot = env.get(*name).unwrap_or_else(|| BoxCell::new_done(mk_var(Regime::Unique, *name)));
            if slot.is_done() {
                let new_term = transition_4(&slot);
                (Configuration::C { stack, term : new_term }, '4')
            } else {
                let (new_term, new_env) = transition_3(slot, &mut stack);
                (Configuration::E { term : new_term, env : new_env, stack }, '3')
            }
        }
        TermNode::Closure { .. } | TermNode::Cache { .. } => errors::bad_dispatch_econf(line!(), &term),
    }
}

/// Dispatches one C-mode ("computed") step, trying rules 5-11 in spec
/// order. Returns `Err(term)` when the stack is empty: `term` is the final
/// normal form.
fn step_computed(mut stack : Vec<Frame>, term : Term, gen : &mut NameGen) -> Result<(Configuration, char), Term> {
    if let Some(Frame::CacheHole(_)) = stack.last() {
        let slot = match stack.pop() {
            Some(Frame::CacheHole(slot)) => slot,
            _ => unreachable!(),
        };
        let new_term = transition_5(slot, term);
        return Ok((Configuration::C { stack, term : new_term }, '5'));
    }

    if matches!(stack.last(), Some(Frame::AppArgHole(_))) {
        if let Some((_slot, abs_name, abs_body, closure_env)) = as_cache_of_abs_closure(&term) {
            let pending = match stack.pop() {
                Some(Frame::AppArgHole(pending)) => pending,
                _ => unreachable!(),
            };
            let (new_term, new_env) = transition_6(pending, abs_name, abs_body, closure_env);
            return Ok((Configuration::E { term : new_term, env : new_env, stack }, '6'));
        }
    }

    if let Some((slot, abs_name, abs_body, closure_env)) = as_cache_of_abs_closure(&term) {
        if !slot.is_done() {
            let (new_term, new_env) = transition_7(slot, abs_name, abs_body, closure_env, &mut stack, gen);
            return Ok((Configuration::E { term : new_term, env : new_env, stack }, '7'));
        } else {
            let new_term = transition_8(&slot);
            return Ok((Configuration::C { stack, term : new_term }, '8'));
        }
    }

    if matches!(stack.last(), Some(Frame::AppArgHole(_))) {
        let pending = match stack.pop() {
            Some(Frame::AppArgHole(pending)) => pending,
            _ => unreachable!(),
        };
        let (new_term, new_env) = transition_9(term, pending, &mut stack);
        return Ok((Configuration::E { term : new_term, env : new_env, stack }, '9'));
    }

    if matches!(stack.last(), Some(Frame::AppFnHole(_))) {
        let fn_value = match stack.pop() {
            Some(Frame::AppFnHole(fn_value)) => fn_value,
            _ => unreachable!(),
        };
        let new_term = transition_10(fn_value, term);
        return Ok((Configuration::C { stack, term : new_term }, 'A'));
    }

    if matches!(stack.last(), Some(Frame::AbsHole(_))) {
        let name = match stack.pop() {
            Some(Frame::AbsHole(name)) => name,
            _ => unreachable!(),
        };
        let new_term = transition_11(name, term);
        return Ok((Configuration::C { stack, term : new_term }, 'B'));
    }

    if stack.is_empty() {
        return Err(term);
    }

    errors::bad_dispatch_cconf(line!(), &term)
}

/// Runs the RKNL machine to normal form on a `Unique`-regime term, under
/// the given starting environment, with no step limit. `gen` supplies
/// fresh names for rule 7's binder eta-expansion; it should be the same
/// generator used to produce `term` via `to_unique`, so machine-internal
/// fresh names never collide with names already present in `term`.
pub fn reduce(term : Term, env : Env, gen : &mut NameGen, cookie : TraceCookie, trace : &mut dyn Trace) -> Term {
    reduce_with_budget(term, env, gen, None, cookie, trace).expect("reduce: unbounded run cannot diverge via step budget")
}

/// As `reduce`, but returns `Err(RknlErr::Diverged(steps))` instead of
/// looping forever once `max_steps` transitions have fired without
/// reaching a normal form -- the step-budget wrapper spec.md's
/// cancellation note asks hosts to build themselves.
pub fn reduce_with_budget(term : Term, env : Env, gen : &mut NameGen, max_steps : Option<usize>, cookie : TraceCookie, trace : &mut dyn Trace) -> RknlResult<Term> {
    let mut conf = Configuration::E { term, env, stack : Vec::new() };
    let mut step = 0usize;
    loop {
        if let Some(max) = max_steps {
            if step >= max {
                return Err(RknlErr::Diverged(step));
            }
        }
        conf = match conf {
            Configuration::E { term, env, stack } => {
                let (next, label) = step_closure(term, env, stack);
                trace.record(step, label, cookie);
                step += 1;
                next
            }
            Configuration::C { stack, term } => match step_computed(stack, term, gen) {
                Ok((next, label)) => {
                    trace.record(step, label, cookie);
                    step += 1;
                    next
                }
                Err(final_term) => return Ok(final_term),
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hamt::PersistentMap;
    use crate::parser::parse_debruijn;
    use crate::printer::print_debruijn;
    use crate::term::to_unique;

    fn normalize(src : &str, max_steps : Option<usize>) -> (Term, Vec<(usize, char)>) {
        let parsed = parse_debruijn(src).unwrap();
        let mut gen = NameGen::new();
        let unique_term = to_unique(&parsed, &mut gen);
        let env : Env = PersistentMap::new();
        let mut labels = Vec::new();
        let result = {
            let mut recorder = |step : usize, label : char, _cookie : TraceCookie| labels.push((step, label));
            reduce_with_budget(unique_term, env, &mut gen, max_steps, 0, &mut recorder).unwrap()
        };
        (crate::term::to_index(&result), labels)
    }

    #[test]
    fn identity_applied_to_identity_is_identity() {
        // (\x.x) (\x.x) -> \x.x
        let (result, _) = normalize("([0][0])", None);
        assert_eq!(print_debruijn(&result), "[0]");
    }

    #[test]
    fn k_combinator_selects_first_argument() {
        // (\x y. x) (\x.x) (\x.x) -> \x.x
        let (result, _) = normalize("(([[1]][0])[0])", None);
        assert_eq!(print_debruijn(&result), "[0]");
    }

    #[test]
    fn reduction_normalizes_under_binders() {
        // \x. (\y.y) x -> \x. x
        let (result, _) = normalize("[([0]0)]", None);
        assert_eq!(print_debruijn(&result), "[0]");
    }

    #[test]
    fn trace_labels_stay_within_the_rule_alphabet() {
        let (_, labels) = normalize("(([[1]][0])[0])", None);
        assert!(!labels.is_empty());
        for (i, (step, label)) in labels.iter().enumerate() {
            assert_eq!(*step, i, "step indices must be strictly increasing from zero");
            assert!("123456789AB".contains(*label), "unexpected trace label {:?}", label);
        }
    }

    #[test]
    fn step_budget_reports_divergence_instead_of_looping() {
        let parsed = parse_debruijn("(([[1]][0])[0])").unwrap();
        let mut gen = NameGen::new();
        let unique_term = to_unique(&parsed, &mut gen);
        let env : Env = PersistentMap::new();
        let mut trace = crate::trace::NullTrace;
        let result = reduce_with_budget(unique_term, env, &mut gen, Some(1), 0, &mut trace);
        assert!(matches!(result, Err(RknlErr::Diverged(1))));
    }
}
