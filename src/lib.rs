pub mod errors;
pub mod hamt;
pub mod term;
pub mod trace;
pub mod machine;
pub mod parser;
pub mod printer;
pub mod cli;
