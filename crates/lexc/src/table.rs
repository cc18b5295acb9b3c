//! Dense matrix form of the final scanner DFA, plus its serialized artifact.
//!
//! Rows are states with one extra trailing error row; columns are the sorted
//! scan alphabet. A cell holding the error row's index means "no transition".

use bit_set::BitSet;
use serde::{Deserialize, Serialize};
use serde_binary::binary_stream::Endian;
use thiserror::Error;

use lexc_fa::Automaton;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to encode scan table: {0}")]
    Encode(String),
    #[error("failed to decode scan table: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfaTable {
    /// Scan alphabet, sorted; column `j` is the `j`-th char of this string.
    symbols: String,
    /// Column count, i.e. `symbols.chars().count()`, so a matrix lookup never
    /// has to re-count a UTF-8 string.
    columns: u32,
    /// Row count, including the error row (always the last row).
    states: u32,
    /// Row-major `states x symbols` next-state matrix.
    matrix: Vec<u32>,
    start: u32,
    /// Candidate token names per row; empty means non-accepting.
    tokens: Vec<Vec<String>>,
}

impl DfaTable {
    pub fn from_dfa(dfa: &Automaton) -> DfaTable {
        let symbols: String = dfa.alphabet().iter().collect();
        let columns = dfa.alphabet().len();
        let rows = dfa.num_states() + 1;
        let error_row = dfa.num_states() as u32;

        let mut matrix = vec![error_row; rows * columns];
        let mut tokens = vec![Vec::new(); rows];
        for id in dfa.state_ids() {
            for (j, &ch) in dfa.alphabet().iter().enumerate() {
                if let Some(next) = dfa.dfa_next(id, ch) {
                    matrix[id.index() * columns + j] = next.index() as u32;
                }
            }
            if dfa.is_accepting(id) {
                tokens[id.index()] = dfa
                    .token_candidates(id)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_else(|| vec![dfa.state(id).token.clone()]);
            }
        }

        DfaTable {
            symbols,
            columns: columns as u32,
            states: rows as u32,
            matrix,
            start: dfa.start().index() as u32,
            tokens,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.states as usize
    }

    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols.chars()
    }

    fn columns(&self) -> usize {
        self.columns as usize
    }

    /// Raw matrix lookup by symbol column.
    pub fn next_state(&self, state: u32, symbol_index: usize) -> u32 {
        self.matrix[state as usize * self.columns() + symbol_index]
    }

    /// The error row stands in for "no transition out of this state".
    pub fn is_error(&self, state: u32) -> bool {
        state == self.states - 1
    }

    pub fn candidates(&self, state: u32) -> &[String] {
        &self.tokens[state as usize]
    }

    /// Rows from which no accepting state is reachable because every symbol
    /// maps back to the row itself. Detected once per table; an accepting
    /// self-loop row (e.g. `(a|b)*` over the full alphabet) is not dead.
    pub fn dead_states(&self) -> BitSet {
        let columns = self.columns();
        let mut dead = BitSet::with_capacity(self.states as usize);
        for row in 0..self.states {
            if !self.tokens[row as usize].is_empty() {
                continue;
            }
            let sink = (0..columns).all(|j| self.next_state(row, j) == row);
            if sink {
                dead.insert(row as usize);
            }
        }
        dead
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        serde_binary::to_vec(self, Endian::Big).map_err(|e| TableError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<DfaTable, TableError> {
        serde_binary::from_slice(data, Endian::Big).map_err(|e| TableError::Decode(e.to_string()))
    }
}
