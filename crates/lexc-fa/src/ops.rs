//! Structural algebra over automata, following Thompson's construction.
//!
//! Every operator copies its operands into a fresh arena, so the result owns
//! a disjoint, densely numbered state space and the callers' automata are
//! left untouched. Plain deep copy is the derived `Clone` on [`Automaton`].

use crate::automaton::{Automaton, State, StateId, Symbol};

/// Appends a copy of every state, symbol, transition, accepting mark and
/// candidate set of `src` to `dst`. Returns the index offset at which `src`'s
/// states landed; `src`'s state `i` is `dst`'s state `i + offset`.
fn absorb(dst: &mut Automaton, src: &Automaton) -> u32 {
    let offset = dst.num_states() as u32;
    let shift = |id: StateId| StateId::new(id.index() as u32 + offset);

    for state in &src.states {
        dst.add_state(state.clone());
    }
    for &symbol in &src.alphabet {
        dst.add_symbol(symbol);
    }
    for (from, symbol, to_set) in src.transitions() {
        for &to in to_set {
            dst.add_transition(shift(from), symbol, shift(to));
        }
    }
    for &id in &src.accepting {
        dst.accepting.insert(shift(id));
    }
    for (&id, candidates) in &src.token_candidates {
        dst.token_candidates.insert(shift(id), candidates.clone());
    }
    offset
}

fn shifted(id: StateId, offset: u32) -> StateId {
    StateId::new(id.index() as u32 + offset)
}

/// New start state with epsilon edges into both operands; accepting states
/// are the union of the operands' accepting states.
pub fn union(a1: &Automaton, a2: &Automaton, token: Option<&str>) -> Automaton {
    let mut out = Automaton::new();
    let o1 = absorb(&mut out, a1);
    let o2 = absorb(&mut out, a2);

    let start = out.add_state(State::default());
    out.add_transition(start, Symbol::Epsilon, shifted(a1.start(), o1));
    out.add_transition(start, Symbol::Epsilon, shifted(a2.start(), o2));
    out.set_start(start);

    let token = token
        .map(str::to_owned)
        .unwrap_or_else(|| format!("({}|{})", a1.token(), a2.token()));
    out.set_token(&token);
    out.set_regex(&format!("({}|{})", a1.regex(), a2.regex()));
    out
}

/// `a1` followed by `a2`: `a1`'s accepting states are demoted and epsilon-wired
/// into `a2`'s start; only `a2`'s accepting states survive.
pub fn concat(a1: &Automaton, a2: &Automaton, token: Option<&str>) -> Automaton {
    let mut out = Automaton::new();
    let o1 = absorb(&mut out, a1);
    let o2 = absorb(&mut out, a2);

    out.set_start(shifted(a1.start(), o1));
    let a2_start = shifted(a2.start(), o2);
    for &old in a1.accepting() {
        let id = shifted(old, o1);
        out.clear_accepting(id);
        out.add_transition(id, Symbol::Epsilon, a2_start);
    }

    let token = token
        .map(str::to_owned)
        .unwrap_or_else(|| format!("({} {})", a1.token(), a2.token()));
    out.set_token(&token);
    out.set_regex(&format!("({} {})", a1.regex(), a2.regex()));
    out
}

/// Zero or more repetitions. A fresh start and a fresh accepting state are
/// added; the direct start-to-accept epsilon edge realizes the empty match.
pub fn kleene_closure(a: &Automaton, token: Option<&str>) -> Automaton {
    closure(a, token, true)
}

/// One or more repetitions: same wiring as the Kleene closure but without the
/// zero-width start-to-accept edge.
pub fn positive_closure(a: &Automaton, token: Option<&str>) -> Automaton {
    closure(a, token, false)
}

fn closure(a: &Automaton, token: Option<&str>, allow_empty: bool) -> Automaton {
    let mut out = Automaton::new();
    let offset = absorb(&mut out, a);

    let start = out.add_state(State::default());
    let accept = out.add_state(State::default());
    out.set_start(start);
    out.add_accepting(accept);

    if allow_empty {
        out.add_transition(start, Symbol::Epsilon, accept);
    }
    out.add_transition(accept, Symbol::Epsilon, start);
    out.add_transition(start, Symbol::Epsilon, shifted(a.start(), offset));
    for &old in a.accepting() {
        let id = shifted(old, offset);
        out.clear_accepting(id);
        out.add_transition(id, Symbol::Epsilon, accept);
    }

    let suffix = if allow_empty { "*" } else { "+" };
    let token = token
        .map(str::to_owned)
        .unwrap_or_else(|| format!("({}){}", a.token(), suffix));
    out.set_token(&token);
    out.set_regex(&format!("({}){}", a.regex(), suffix));
    out
}

/// N-ary union: one fresh start state epsilon-fanning into every operand.
/// Unlike [`union`], each operand keeps its own token, so a multi-rule NFA
/// remembers which rule each accepting state belongs to.
pub fn union_all(automata: &[Automaton]) -> Automaton {
    let mut out = Automaton::new();
    if automata.is_empty() {
        return out;
    }

    let start = out.add_state(State::default());
    out.set_start(start);

    let mut names = Vec::with_capacity(automata.len());
    for a in automata {
        let offset = absorb(&mut out, a);
        out.add_transition(start, Symbol::Epsilon, shifted(a.start(), offset));
        names.push(format!("({})", a.token()));
    }
    out.set_regex(&names.join("|"));
    out
}
