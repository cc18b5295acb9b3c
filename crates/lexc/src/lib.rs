pub mod predictor;
pub mod regex;
pub mod rules;
pub mod table;

#[cfg(test)]
mod lex_tests;

pub use predictor::{Predictor, Token};
pub use rules::{compile_rules, parse_rules, CompiledRules, Rule};
pub use table::DfaTable;
