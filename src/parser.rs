use std::iter::Peekable;
use std::str::Chars;

use crate::errors::{RknlErr, RknlResult};
use crate::term::{mk_abs, mk_app, mk_var, Regime, Term};

/// Cursor over the input characters. Mirrors nanoda's `LineParser` in spirit
/// (a hand-rolled, stateful cursor rather than a grammar-generator parser)
/// but walks characters instead of whitespace-separated tokens, since both
/// of our grammars are character-level.
struct Cursor<'s> {
    chars : Peekable<Chars<'s>>,
    pos : usize,
}

impl<'s> Cursor<'s> {
    fn new(src : &'s str) -> Self {
        Cursor { chars : src.chars().peekable(), pos : 0 }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect_eof_err(&self, what : &'static str) -> RknlErr {
        RknlErr::UnexpectedEof(what, line!())
    }
}

/// Parses the bracket-based textual de Bruijn syntax from
/// `original_source/src/parse.c`'s `rec`: `[` opens an abstraction body,
/// `(` opens an application (lhs then rhs follow with no separator
/// required), an ASCII digit run is a de Bruijn index, and any other
/// character is skipped and the next one is tried -- the original's "quite
/// tolerant" policy, which lets `]`/`)`/whitespace act as visual-only
/// closers without the parser needing to track matching depth.
///
/// Unlike the original (limited to indices `0`-`9`), multi-digit indices
/// are read as a single integer.
pub fn parse_debruijn(src : &str) -> RknlResult<Term> {
    let mut cur = Cursor::new(src);
    parse_debruijn_rec(&mut cur)
}

fn parse_debruijn_rec(cur : &mut Cursor) -> RknlResult<Term> {
    loop {
        let start_pos = cur.pos;
        match cur.advance() {
            None => return Err(cur.expect_eof_err("de Bruijn term")),
            Some('[') => {
                let body = parse_debruijn_rec(cur)?;
                return Ok(mk_abs(0, body));
            }
            Some('(') => {
                let lhs = parse_debruijn_rec(cur)?;
                let rhs = parse_debruijn_rec(cur)?;
                return Ok(mk_app(lhs, rhs));
            }
            Some(c) if c.is_ascii_digit() => {
                let mut digits = String::new();
                digits.push(c);
                while let Some(d) = cur.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        cur.advance();
                    } else {
                        break;
                    }
                }
                let n = digits.parse::<u64>().map_err(|_| RknlErr::BadIndex(start_pos))?;
                return Ok(mk_var(Regime::Index, n));
            }
            Some(_) => continue, // tolerant: skip unrecognized separators
        }
    }
}

/// Parses Binary Lambda Calculus: `00` starts an abstraction, `01` an
/// application, and a run of one-or-more `1`s terminated by a `0` is a de
/// Bruijn index (`n` ones encode index `n - 1`), grounded in the inverse of
/// `original_source/src/term.c`'s `print_blc`. Any character that isn't `0`
/// or `1` is skipped, the same tolerant policy `parse_debruijn_rec` applies
/// to its own separators.
pub fn parse_blc(src : &str) -> RknlResult<Term> {
    let mut cur = Cursor::new(src);
    parse_blc_rec(&mut cur)
}

/// Advances past (and ignores) any non-`0`/`1` characters, returning the
/// next bit, or `None` at end of input.
fn next_bit(cur : &mut Cursor) -> Option<char> {
    loop {
        match cur.advance() {
            None => return None,
            Some(c @ '0') | Some(c @ '1') => return Some(c),
            Some(_) => continue,
        }
    }
}

fn parse_blc_rec(cur : &mut Cursor) -> RknlResult<Term> {
    match next_bit(cur) {
        None => Err(cur.expect_eof_err("BLC term")),
        Some('0') => match next_bit(cur) {
            Some('0') => {
                let body = parse_blc_rec(cur)?;
                Ok(mk_abs(0, body))
            }
            Some('1') => {
                let lhs = parse_blc_rec(cur)?;
                let rhs = parse_blc_rec(cur)?;
                Ok(mk_app(lhs, rhs))
            }
            Some(_) => unreachable!("next_bit only returns '0' or '1'"),
            None => Err(cur.expect_eof_err("BLC tag (00 or 01)")),
        },
        Some('1') => {
            let mut ones = 1u64;
            loop {
                match next_bit(cur) {
                    Some('1') => ones += 1,
                    Some('0') => break,
                    Some(_) => unreachable!("next_bit only returns '0' or '1'"),
                    None => return Err(cur.expect_eof_err("BLC variable terminator")),
                }
            }
            Ok(mk_var(Regime::Index, ones - 1))
        }
        Some(_) => unreachable!("next_bit only returns '0' or '1'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::printer::print_blc;
    use crate::term::TermNode;

    #[test]
    fn parse_debruijn_identity() {
        let t = parse_debruijn("[0]").unwrap();
        match t.node() {
            TermNode::Abs { body, .. } => assert!(body.is_var()),
            _ => panic!("expected Abs"),
        }
    }

    #[test]
    fn parse_debruijn_application_and_multidigit_index() {
        let t = parse_debruijn("(12 34)").unwrap();
        match t.node() {
            TermNode::App { lhs, rhs } => {
                assert!(matches!(lhs.node(), TermNode::Var { name : 12, .. }));
                assert!(matches!(rhs.node(), TermNode::Var { name : 34, .. }));
            }
            _ => panic!("expected App"),
        }
    }

    #[test]
    fn parse_debruijn_skips_unrecognized_separators() {
        let a = parse_debruijn("[0]").unwrap();
        let b = parse_debruijn("[0].").unwrap();
        assert_eq!(print_blc(&a), print_blc(&b));
    }

    #[test]
    fn parse_blc_roundtrips_through_printer() {
        // S combinator: \x y z. x z (y z)
        let t = parse_debruijn("[[[((2 0)(1 0))]]]").unwrap();
        let encoded = print_blc(&t);
        let reparsed = parse_blc(&encoded).unwrap();
        assert_eq!(print_blc(&reparsed), encoded);
    }

    #[test]
    fn parse_blc_var_encoding() {
        // index 0 => "10", index 1 => "110"
        assert_matches!(parse_blc("10").unwrap().node(), TermNode::Var { name : 0, .. });
        assert_matches!(parse_blc("110").unwrap().node(), TermNode::Var { name : 1, .. });
    }

    #[test]
    fn parse_blc_skips_unrecognized_characters() {
        let a = parse_blc("0010").unwrap();
        let b = parse_blc(" 00\n1 0\t").unwrap();
        assert_eq!(print_blc(&a), print_blc(&b));
    }

    #[test]
    fn unexpected_eof_is_reported() {
        assert_matches!(parse_blc(""), Err(RknlErr::UnexpectedEof(..)));
        assert_matches!(parse_debruijn(""), Err(RknlErr::UnexpectedEof(..)));
    }
}
