pub mod automaton;
pub mod convert;
pub mod ops;


pub use automaton::{Automaton, State, StateId, Symbol};
