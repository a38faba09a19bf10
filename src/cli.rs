use std::io::Read;
use std::path::PathBuf;

use structopt::StructOpt;

use crate::errors;

/// Command-line surface: `rknl <path>` or `rknl -` for stdin, per spec
/// section 6. `--max-steps` and `--debug` are the ambient additions this
/// crate layers on top (cf. `ammkrn-nanoda`'s `Opt`, which adds `--threads`
/// and `--print` the same way over its own teacher's bare file-list CLI).
#[derive(StructOpt, Debug)]
#[structopt(raw(setting = "structopt::clap::AppSettings::ColoredHelp"))]
#[structopt(name = "rknl", about = "Normalizes a Binary Lambda Calculus term via the RKNL abstract machine.", author = "rknl", version = "0.1.0")]
pub struct Opt {
    /// Path to the BLC source, or `-` to read from stdin.
    #[structopt(name = "PATH", parse(from_os_str))]
    pub path : PathBuf,

    /// Abort reduction with a diagnostic instead of looping forever once
    /// this many transitions have fired. Unset means no budget.
    #[structopt(short = "m", long = "max-steps")]
    pub max_steps : Option<usize>,

    /// Dump the parsed arguments and the full transition trace to stderr.
    #[structopt(short = "d", long = "debug")]
    pub debug : bool,
}

impl Opt {
    /// Reads the BLC source named by `self.path`, treating a lone `-` as a
    /// request to read stdin instead of opening a file by that name.
    pub fn try_read_source(&self) -> String {
        if self.path.as_os_str() == "-" {
            let mut buf = String::new();
            match std::io::stdin().read_to_string(&mut buf) {
                Ok(_) => buf,
                Err(e) => errors::read_file_err(line!(), &self.path, e),
            }
        } else {
            match std::fs::read_to_string(&self.path) {
                Ok(s) => s,
                Err(e) => errors::read_file_err(line!(), &self.path, e),
            }
        }
    }
}
