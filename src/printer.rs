use crate::term::{Term, TermNode};

/// Encodes a `Var`/`Abs`/`App`-only, `Index`-regime term as Binary Lambda
/// Calculus text, the inverse of `parser::parse_blc`. Grounded directly in
/// `original_source/src/term.c`'s `print_blc`: `00` precedes an
/// abstraction's body, `01` precedes an application's two subterms, and a
/// de Bruijn index `n` is written as `n + 1` ones followed by a zero.
pub fn print_blc(term : &Term) -> String {
    let mut out = String::new();
    print_blc_into(term, &mut out);
    out
}

fn print_blc_into(term : &Term, out : &mut String) {
    match term.node() {
        TermNode::Abs { body, .. } => {
            out.push_str("00");
            print_blc_into(body, out);
        }
        TermNode::App { lhs, rhs } => {
            out.push_str("01");
            print_blc_into(lhs, out);
            print_blc_into(rhs, out);
        }
        TermNode::Var { name, .. } => {
            for _ in 0..=*name {
                out.push('1');
            }
            out.push('0');
        }
        TermNode::Closure { .. } | TermNode::Cache { .. } => {
            crate::errors::impure_normal_form(line!(), term)
        }
    }
}

/// Textual de Bruijn form, the inverse of `parser::parse_debruijn` and
/// grounded in the same file's `print_term`: `[body]` for an abstraction,
/// `(lhs rhs)` for an application, and the bare index for a variable.
pub fn print_debruijn(term : &Term) -> String {
    let mut out = String::new();
    print_debruijn_into(term, &mut out);
    out
}

fn print_debruijn_into(term : &Term, out : &mut String) {
    match term.node() {
        TermNode::Abs { body, .. } => {
            out.push('[');
            print_debruijn_into(body, out);
            out.push(']');
        }
        TermNode::App { lhs, rhs } => {
            out.push('(');
            print_debruijn_into(lhs, out);
            out.push(' ');
            print_debruijn_into(rhs, out);
            out.push(')');
        }
        TermNode::Var { name, .. } => {
            out.push_str(&name.to_string());
        }
        TermNode::Closure { .. } | TermNode::Cache { .. } => {
            crate::errors::impure_normal_form(line!(), term)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{mk_abs, mk_app, mk_var, Regime};

    #[test]
    fn prints_identity() {
        let id = mk_abs(0, mk_var(Regime::Index, 0));
        assert_eq!(print_blc(&id), "0010");
        assert_eq!(print_debruijn(&id), "[0]");
    }

    #[test]
    fn prints_application() {
        let t = mk_app(mk_var(Regime::Index, 0), mk_var(Regime::Index, 1));
        assert_eq!(print_blc(&t), "0110110");
        assert_eq!(print_debruijn(&t), "(0 1)");
    }
}
