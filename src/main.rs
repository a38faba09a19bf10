#![forbid(unsafe_code)]
#![allow(unused_parens)]

use std::time::SystemTime;

use structopt::StructOpt;

use rknl::cli::Opt;
use rknl::hamt::PersistentMap;
use rknl::term::{to_index, to_unique, NameGen};
use rknl::trace::{NullTrace, Trace, TraceCookie};
use rknl::{machine, parser, printer, term};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL : mimallocator::Mimalloc = mimallocator::Mimalloc;

/// Collects every transition label fired during a `--debug` run, printed to
/// stderr after reduction finishes.
struct DebugTrace {
    labels : Vec<(usize, char)>,
}

impl Trace for DebugTrace {
    fn record(&mut self, step : usize, label : char, _cookie : TraceCookie) {
        self.labels.push((step, label));
    }
}

fn main() {
    let opt = Opt::from_args();

    if opt.debug {
        eprintln!("CLI returned these arguments: {:#?}", opt);
    }

    let source = opt.try_read_source();

    let parsed = match parser::parse_blc(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("rknl: {}", e);
            std::process::exit(1);
        }
    };

    let start_instant = SystemTime::now();

    let mut gen = NameGen::new();
    let unique_term = to_unique(&parsed, &mut gen);
    let env : PersistentMap<term::BoxCell> = PersistentMap::new();

    let cookie : TraceCookie = 0;
    let mut debug_trace = DebugTrace { labels : Vec::new() };
    let mut null_trace = NullTrace;
    let trace : &mut dyn Trace = if opt.debug { &mut debug_trace } else { &mut null_trace };

    let result = machine::reduce_with_budget(unique_term, env, &mut gen, opt.max_steps, cookie, trace);

    let normal_form = match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("rknl: {}", e);
            std::process::exit(1);
        }
    };

    let indexed = to_index(&normal_form);
    println!("{}", printer::print_blc(&indexed));

    if opt.debug {
        eprintln!("### trace ({} steps) ###", debug_trace.labels.len());
        for (step, label) in &debug_trace.labels {
            eprintln!("  {:>6}: {}", step, label);
        }
    }

    match start_instant.elapsed() {
        Ok(dur) => eprintln!("### done in {:?} ###", dur),
        Err(e) => eprintln!("### done, but the clock went backwards measuring it: {} ###", e),
    }
}
