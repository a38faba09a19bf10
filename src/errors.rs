use std::fmt::Debug;

/// Diagnostics are reported in two registers, matching the error handling
/// policy of the system: most term-level mishaps (unbound indices/names, a
/// malformed variant surfacing where it shouldn't) are recoverable -- we print
/// a notice and keep going with a best-effort substitute. A handful of
/// genuine invariant violations (a Closure/Cache escaping into a normal form,
/// a Todo box whose payload isn't a Closure) are bugs, not user error, and we
/// abort the process the way nanoda's partial-function helpers do.

pub fn unbound_index(loc : u32, idx : usize, scope_size : usize) {
    eprintln!("term.rs line {}: unbound de Bruijn index {} under a scope of size {}; substituting a fresh name", loc, idx, scope_size);
}

pub fn unbound_name(loc : u32, name : u64) {
    eprintln!("term.rs line {}: unbound unique name {} while converting back to de Bruijn indices; index is ill-defined", loc, name);
}

pub fn bad_dispatch_econf<T : Debug>(loc : u32, got : &T) -> ! {
    eprintln!("machine.rs line {}: E-configuration dispatch expected Var/Abs/App, got {:?}\n", loc, got);
    std::process::exit(1);
}

pub fn bad_dispatch_cconf<T : Debug>(loc : u32, got : &T) -> ! {
    eprintln!("machine.rs line {}: no C-configuration transition matched; term was {:?}\n", loc, got);
    std::process::exit(1);
}

pub fn todo_box_not_closure<T : Debug>(loc : u32, got : &T) -> ! {
    eprintln!("machine.rs line {}: rule 3 requires a Todo box whose payload is a Closure, got {:?}\n", loc, got);
    std::process::exit(1);
}

pub fn impure_normal_form<T : Debug>(loc : u32, got : &T) -> ! {
    eprintln!("term.rs line {}: Closure/Cache/Box node survived into a duplicated normal form: {:?}\n", loc, got);
    std::process::exit(1);
}

pub fn alpha_equiv_wrong_regime(loc : u32) -> ! {
    eprintln!("term.rs line {}: alpha_equivalent is only defined on terms in Index regime", loc);
    std::process::exit(1);
}

pub fn read_file_err<T : std::fmt::Display>(loc : u32, path : &std::path::Path, err : T) -> ! {
    eprintln!("cli.rs line {}: failed to read input from {:?}: {}\n", loc, path, err);
    std::process::exit(1);
}

pub type RknlResult<T> = Result<T, RknlErr>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RknlErr {
    /// the input ran out of characters before a term was complete
    UnexpectedEof(&'static str, u32),
    /// a textual de Bruijn index didn't parse as an integer
    BadIndex(usize),
    /// reduction did not reach a normal form within the configured step budget
    Diverged(usize),
}

impl std::fmt::Display for RknlErr {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RknlErr::UnexpectedEof(file, loc) => write!(f, "parser at {} line {}: input exhausted before a term was complete", file, loc),
            RknlErr::BadIndex(pos) => write!(f, "parser: malformed variable index at position {}", pos),
            RknlErr::Diverged(steps) => write!(f, "reduction did not reach a normal form within {} steps", steps),
        }
    }
}

impl std::error::Error for RknlErr {}
