//! Longest-match-with-priority scanning over a compiled [`DfaTable`].

use std::collections::{BTreeMap, HashMap};

use bit_set::BitSet;

use crate::table::DfaTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub lexeme: String,
}

/// A stateful sequential scanner over one input buffer. Each predictor owns
/// its own cursor, symbol index and dead-state set; the table and priority
/// map are read-only after construction, so several predictors may share
/// copies of the same table safely.
pub struct Predictor {
    table: DfaTable,
    priorities: BTreeMap<String, i32>,
    symbol_index: HashMap<char, usize>,
    dead: BitSet,
    program: Vec<char>,
    index: usize,
}

impl Predictor {
    pub fn new(table: DfaTable, priorities: BTreeMap<String, i32>, program: &str) -> Predictor {
        let symbol_index = table.symbols().enumerate().map(|(j, c)| (c, j)).collect();
        let dead = table.dead_states();
        Predictor {
            table,
            priorities,
            symbol_index,
            dead,
            program: program.chars().collect(),
            index: 0,
        }
    }

    /// The next `(token, lexeme)` pair, or `None` at end of stream.
    ///
    /// Characters that no rule can start are skipped one at a time and
    /// scanning resumes at the following index.
    pub fn next_token(&mut self) -> Option<Token> {
        while self.index < self.program.len() {
            if let Some(token) = self.scan_once() {
                return Some(token);
            }
        }
        None
    }

    /// One scan attempt from the current index. Guaranteed to either produce
    /// a token or advance the index, so the caller's retry loop terminates.
    fn scan_once(&mut self) -> Option<Token> {
        let mut state = self.table.start();
        let mut lexeme = String::new();
        // Top of the candidate stack only: a longer match always replaces a
        // shorter one, so earlier entries are never consulted.
        let mut best: Option<Token> = None;

        while self.index < self.program.len() {
            let c = self.program[self.index];
            if c.is_whitespace() {
                self.index += 1;
                break;
            }
            lexeme.push(c);

            let next = self.symbol_index.get(&c).map(|&j| self.table.next_state(state, j));
            let next = match next {
                Some(n) if !self.table.is_error(n) => n,
                _ => {
                    // No transition: the offending character is consumed but
                    // is not part of any token.
                    self.index += 1;
                    break;
                }
            };

            let candidates = self.table.candidates(next);
            if !candidates.is_empty() {
                best = Some(Token {
                    name: self.best_token(candidates),
                    lexeme: lexeme.clone(),
                });
            }

            if self.dead.contains(next as usize) {
                // Nothing can extend the match past a dead state. Without a
                // candidate in hand the character must still be skipped, or
                // the next attempt would start in the same place.
                if best.is_none() {
                    self.index += 1;
                }
                break;
            }

            state = next;
            self.index += 1;
        }

        best
    }

    /// Highest-priority candidate; equal priorities fall back to the
    /// lexicographically smallest name so prediction stays deterministic.
    fn best_token(&self, candidates: &[String]) -> String {
        let priority =
            |name: &String| self.priorities.get(name).copied().unwrap_or(i32::MIN);
        candidates
            .iter()
            .max_by(|a, b| priority(a).cmp(&priority(b)).then_with(|| b.cmp(a)))
            .expect("accepting state has at least one candidate")
            .clone()
    }
}

impl Iterator for Predictor {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}
