use std::collections::{BTreeMap, BTreeSet};

use lexc_util::make_type_idx;

make_type_idx!(StateId, State);

/// One node of an automaton. States live in the arena of exactly one
/// [`Automaton`]; a `StateId` from one automaton must never be used to index
/// another. The algebra operators in [`crate::ops`] re-push (and therefore
/// re-index) every operand state, so disjointness holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub accepting: bool,
    pub token: String,
}

/// A transition label. Epsilon is a first-class variant rather than a
/// reserved alphabet symbol, so the scan alphabet can never collide with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Epsilon,
    Char(char),
}

/// A finite automaton over single-character symbols.
///
/// The same representation carries both NFAs (multiple destinations per key,
/// epsilon edges allowed) and DFAs (at most one destination per key, no
/// epsilon edges). `token_candidates` is only populated on DFA states that
/// were produced by subset construction: it records every rule token whose
/// accepting state folded into that DFA state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    pub(crate) states: Vec<State>,
    pub(crate) alphabet: BTreeSet<char>,
    pub(crate) transitions: BTreeMap<(StateId, Symbol), BTreeSet<StateId>>,
    pub(crate) start: StateId,
    pub(crate) accepting: BTreeSet<StateId>,
    pub(crate) regex: String,
    pub(crate) token_candidates: BTreeMap<StateId, BTreeSet<String>>,
}

impl Default for Automaton {
    fn default() -> Self {
        Automaton::new()
    }
}

impl Automaton {
    /// An automaton with no states. The start id is a placeholder until the
    /// first state is added and [`Automaton::set_start`] is called.
    pub fn new() -> Automaton {
        Automaton {
            states: Vec::new(),
            alphabet: BTreeSet::new(),
            transitions: BTreeMap::new(),
            start: StateId::new(0),
            accepting: BTreeSet::new(),
            regex: String::new(),
            token_candidates: BTreeMap::new(),
        }
    }

    /// The primitive of Thompson's construction: two states joined by a
    /// single `symbol` transition. The accepting state's token defaults to
    /// the symbol itself.
    pub fn single(symbol: char, token: Option<&str>) -> Automaton {
        let mut a = Automaton::new();
        let q0 = a.add_state(State::default());
        let q1 = a.add_state(State {
            accepting: true,
            token: token.map(str::to_owned).unwrap_or_else(|| symbol.to_string()),
        });
        a.alphabet.insert(symbol);
        a.start = q0;
        a.accepting.insert(q1);
        a.add_transition(q0, Symbol::Char(symbol), q1);
        a.regex = format!("({})", a.states[q1].token);
        a
    }

    /// An automaton accepting exactly the empty string.
    pub fn epsilon() -> Automaton {
        let mut a = Automaton::new();
        let q0 = a.add_state(State::default());
        let q1 = a.add_state(State {
            accepting: true,
            token: "\\L".to_owned(),
        });
        a.start = q0;
        a.accepting.insert(q1);
        a.add_transition(q0, Symbol::Epsilon, q1);
        a.regex = "(\\L)".to_owned();
        a
    }

    pub fn add_state(&mut self, state: State) -> StateId {
        StateId::from_push(&mut self.states, state)
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id]
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len() as u32).map(StateId::new)
    }

    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    pub fn add_symbol(&mut self, symbol: char) {
        self.alphabet.insert(symbol);
    }

    pub fn add_transition(&mut self, from: StateId, symbol: Symbol, to: StateId) {
        self.transitions.entry((from, symbol)).or_default().insert(to);
    }

    /// All destinations for `(from, symbol)`, or `None` if the relation has
    /// no entry for that key.
    pub fn next_states(&self, from: StateId, symbol: Symbol) -> Option<&BTreeSet<StateId>> {
        self.transitions.get(&(from, symbol))
    }

    /// DFA lookup: the unique destination for `(from, ch)`, if any.
    pub fn dfa_next(&self, from: StateId, ch: char) -> Option<StateId> {
        self.transitions
            .get(&(from, Symbol::Char(ch)))
            .and_then(|set| set.iter().next().copied())
    }

    pub fn transitions(&self) -> impl Iterator<Item = (StateId, Symbol, &BTreeSet<StateId>)> {
        self.transitions
            .iter()
            .map(|(&(from, symbol), to)| (from, symbol, to))
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn set_start(&mut self, id: StateId) {
        self.start = id;
    }

    pub fn accepting(&self) -> &BTreeSet<StateId> {
        &self.accepting
    }

    pub fn add_accepting(&mut self, id: StateId) {
        self.states[id].accepting = true;
        self.accepting.insert(id);
    }

    /// Demotes an accepting state to a plain one, dropping its candidate set.
    pub fn clear_accepting(&mut self, id: StateId) {
        self.states[id].accepting = false;
        self.accepting.remove(&id);
        self.token_candidates.remove(&id);
    }

    pub fn is_accepting(&self, id: StateId) -> bool {
        self.accepting.contains(&id)
    }

    pub fn has_accepting_in<'a>(&self, ids: impl IntoIterator<Item = &'a StateId>) -> bool {
        ids.into_iter().any(|id| self.is_accepting(*id))
    }

    /// The token of the first accepting state, or empty when there is none.
    pub fn token(&self) -> &str {
        self.accepting
            .iter()
            .next()
            .map(|&id| self.states[id].token.as_str())
            .unwrap_or("")
    }

    /// Renames every accepting state to `token` and collapses its candidate
    /// set to that single name.
    pub fn set_token(&mut self, token: &str) {
        let accepting: Vec<StateId> = self.accepting.iter().copied().collect();
        for id in accepting {
            self.states[id].token = token.to_owned();
            self.token_candidates
                .insert(id, BTreeSet::from([token.to_owned()]));
        }
    }

    pub fn regex(&self) -> &str {
        &self.regex
    }

    pub fn set_regex(&mut self, regex: &str) {
        self.regex = regex.to_owned();
    }

    pub fn token_candidates(&self, id: StateId) -> Option<&BTreeSet<String>> {
        self.token_candidates.get(&id)
    }

    pub fn set_token_candidates(&mut self, id: StateId, candidates: BTreeSet<String>) {
        self.token_candidates.insert(id, candidates);
    }

    /// Runs this automaton as a DFA over `input`. Returns whether the whole
    /// input is accepted, together with the candidate tokens of the state the
    /// run stopped in (empty when rejected).
    pub fn simulate(&self, input: &str) -> (bool, BTreeSet<String>) {
        let mut current = self.start;
        for ch in input.chars() {
            match self.dfa_next(current, ch) {
                Some(next) => current = next,
                None => return (false, BTreeSet::new()),
            }
        }
        if !self.is_accepting(current) {
            return (false, BTreeSet::new());
        }
        let candidates = self
            .token_candidates
            .get(&current)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([self.states[current].token.clone()]));
        (true, candidates)
    }
}
