//! NFA-to-DFA subset construction and Moore-style DFA minimization.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use bit_set::BitSet;

use crate::automaton::{Automaton, State, StateId, Symbol};

/// Epsilon-closure memo for one conversion run. The cache keys are state ids
/// of a single automaton, so a cache must never outlive the conversion it was
/// created for or be reused for a different automaton.
pub struct ClosureCache {
    memo: HashMap<StateId, BTreeSet<StateId>>,
}

impl ClosureCache {
    pub fn new() -> ClosureCache {
        ClosureCache {
            memo: HashMap::new(),
        }
    }

    /// All states reachable from `state` through epsilon edges alone,
    /// including `state` itself. Iterative traversal; the visited check before
    /// each push keeps the epsilon cycles of the closure operators from
    /// looping.
    pub fn closure(&mut self, a: &Automaton, state: StateId) -> BTreeSet<StateId> {
        if let Some(cached) = self.memo.get(&state) {
            return cached.clone();
        }

        let mut visited = BitSet::with_capacity(a.num_states());
        visited.insert(state.index());
        let mut stack = vec![state];
        while let Some(current) = stack.pop() {
            if let Some(next) = a.next_states(current, Symbol::Epsilon) {
                for &n in next {
                    if visited.insert(n.index()) {
                        stack.push(n);
                    }
                }
            }
        }

        let closure: BTreeSet<StateId> = visited.iter().map(|i| StateId::new(i as u32)).collect();
        self.memo.insert(state, closure.clone());
        closure
    }
}

impl Default for ClosureCache {
    fn default() -> Self {
        ClosureCache::new()
    }
}

/// Subset construction. The result is deterministic and total: every state
/// has exactly one destination per alphabet symbol, with a single shared
/// self-looping sink standing in for "no move". Accepting DFA states record
/// in their candidate set the token of every NFA accepting state that folded
/// into them.
pub fn to_dfa(nfa: &Automaton) -> Automaton {
    let mut cache = ClosureCache::new();
    let mut dfa = Automaton::new();
    dfa.alphabet = nfa.alphabet.clone();
    dfa.regex = nfa.regex.clone();

    let symbols: Vec<char> = nfa.alphabet.iter().copied().collect();
    let mut registry: HashMap<BTreeSet<StateId>, StateId> = HashMap::new();
    let mut queue: VecDeque<BTreeSet<StateId>> = VecDeque::new();
    let mut dead: Option<StateId> = None;

    let start_set = cache.closure(nfa, nfa.start());
    let start_id = create_dfa_state(&start_set, nfa, &mut dfa);
    dfa.set_start(start_id);
    registry.insert(start_set.clone(), start_id);
    queue.push_back(start_set);

    while let Some(current) = queue.pop_front() {
        let from = registry[&current];
        for &ch in &symbols {
            let mut reachable: BTreeSet<StateId> = BTreeSet::new();
            for &s in &current {
                if let Some(next) = nfa.next_states(s, Symbol::Char(ch)) {
                    reachable.extend(next.iter().copied());
                }
            }
            let mut closure: BTreeSet<StateId> = BTreeSet::new();
            for &r in &reachable {
                closure.extend(cache.closure(nfa, r));
            }

            let to = if closure.is_empty() {
                *dead.get_or_insert_with(|| {
                    let sink = dfa.add_state(State::default());
                    for &symbol in &symbols {
                        dfa.add_transition(sink, Symbol::Char(symbol), sink);
                    }
                    sink
                })
            } else if let Some(&existing) = registry.get(&closure) {
                existing
            } else {
                let id = create_dfa_state(&closure, nfa, &mut dfa);
                registry.insert(closure.clone(), id);
                queue.push_back(closure);
                id
            };
            dfa.add_transition(from, Symbol::Char(ch), to);
        }
    }

    dfa
}

fn create_dfa_state(members: &BTreeSet<StateId>, nfa: &Automaton, dfa: &mut Automaton) -> StateId {
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    for &s in members {
        if nfa.is_accepting(s) {
            candidates.insert(nfa.state(s).token.clone());
        }
    }

    let id = dfa.add_state(State {
        accepting: !candidates.is_empty(),
        token: candidates.iter().next().cloned().unwrap_or_default(),
    });
    if !candidates.is_empty() {
        dfa.accepting.insert(id);
        dfa.token_candidates.insert(id, candidates);
    }
    id
}

/// Partition-refinement minimization.
///
/// The initial partition separates accepting states by candidate-token set
/// (not just accepting vs non-accepting): two accepting states that announce
/// different tokens must never merge, or the minimized DFA would report the
/// wrong token for some accepted string.
pub fn minimize(dfa: &Automaton) -> Automaton {
    let symbols: Vec<char> = dfa.alphabet.iter().copied().collect();

    let mut by_candidates: BTreeMap<BTreeSet<String>, Vec<StateId>> = BTreeMap::new();
    let mut non_accepting: Vec<StateId> = Vec::new();
    for id in dfa.state_ids() {
        if dfa.is_accepting(id) {
            let key = dfa
                .token_candidates(id)
                .cloned()
                .unwrap_or_else(|| BTreeSet::from([dfa.state(id).token.clone()]));
            by_candidates.entry(key).or_default().push(id);
        } else {
            non_accepting.push(id);
        }
    }
    let mut groups: Vec<Vec<StateId>> = by_candidates.into_values().collect();
    if !non_accepting.is_empty() {
        groups.push(non_accepting);
    }

    loop {
        let next = refine(&groups, dfa, &symbols);
        if next == groups {
            break;
        }
        groups = next;
    }

    build_minimized(&groups, dfa, &symbols)
}

/// One refinement pass: split every group by the tuple of destination groups
/// over the alphabet. States with identical signatures stay together.
fn refine(groups: &[Vec<StateId>], dfa: &Automaton, symbols: &[char]) -> Vec<Vec<StateId>> {
    let mut member = vec![0usize; dfa.num_states()];
    for (gi, group) in groups.iter().enumerate() {
        for &s in group {
            member[s.index()] = gi;
        }
    }

    let mut next: Vec<Vec<StateId>> = Vec::new();
    for group in groups {
        let mut split: BTreeMap<Vec<usize>, Vec<StateId>> = BTreeMap::new();
        for &s in group {
            let signature: Vec<usize> = symbols
                .iter()
                .map(|&ch| {
                    let to = dfa
                        .dfa_next(s, ch)
                        .expect("minimization input must be a total DFA");
                    member[to.index()]
                })
                .collect();
            split.entry(signature).or_default().push(s);
        }
        next.extend(split.into_values());
    }
    next
}

fn build_minimized(groups: &[Vec<StateId>], dfa: &Automaton, symbols: &[char]) -> Automaton {
    let mut min = Automaton::new();
    min.alphabet = dfa.alphabet.clone();
    min.regex = dfa.regex.clone();

    let mut member = vec![0usize; dfa.num_states()];
    for (gi, group) in groups.iter().enumerate() {
        for &s in group {
            member[s.index()] = gi;
        }
    }

    // One representative state per group; accepting iff the group holds any
    // old accepting state, with the candidate sets of all members merged.
    let mut accepting_members = BitSet::with_capacity(dfa.num_states());
    for &s in dfa.accepting() {
        accepting_members.insert(s.index());
    }
    let mut new_ids: Vec<StateId> = Vec::with_capacity(groups.len());
    for group in groups {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        let mut token = String::new();
        let accepting = group.iter().any(|s| accepting_members.contains(s.index()));
        if accepting {
            for &s in group {
                if let Some(c) = dfa.token_candidates(s) {
                    candidates.extend(c.iter().cloned());
                }
                if token.is_empty() && dfa.is_accepting(s) {
                    token = dfa.state(s).token.clone();
                }
            }
        }
        let id = min.add_state(State { accepting, token });
        if accepting {
            min.accepting.insert(id);
            min.token_candidates.insert(id, candidates);
        }
        new_ids.push(id);
    }

    min.set_start(new_ids[member[dfa.start().index()]]);

    for (gi, group) in groups.iter().enumerate() {
        let representative = group[0];
        for &ch in symbols {
            let old_to = dfa
                .dfa_next(representative, ch)
                .expect("minimization input must be a total DFA");
            min.add_transition(new_ids[gi], Symbol::Char(ch), new_ids[member[old_to.index()]]);
        }
    }

    min
}
