//! Rule-file handling: parsing rule lines, compiling every rule to a
//! minimized per-rule DFA, assigning token priorities, and folding the whole
//! rule set into one scan table.

use std::collections::{BTreeMap, HashMap, VecDeque};

use thiserror::Error;

use lexc_fa::{convert, ops, Automaton};

use crate::regex::{self, RegexError, Tok};
use crate::table::DfaTable;

/// Keywords and punctuation outrank named rules, so a keyword always beats an
/// identifier rule that matches the same lexeme. Within the named band, a
/// rule is demoted one whole band for every rule that references it: a helper
/// like `letter` folds its accepting states into those of every rule built on
/// top of it, and the composite rule's token must win there. Earlier rules
/// outrank later ones within a band.
const LITERAL_PRIORITY_BASE: i32 = 1000;
const NAMED_PRIORITY_BASE: i32 = 0;
const REFERENCED_DEMOTION: i32 = 1000;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule '{name}': {source}")]
    Regex {
        name: String,
        #[source]
        source: RegexError,
    },
    #[error("rule '{0}' references names that never resolve")]
    Unresolvable(String),
    #[error("malformed rule line: '{0}'")]
    MalformedLine(String),
    #[error("malformed priority entry: '{0}'")]
    MalformedPriority(String),
}

/// One logical rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// From a `{...}` list; the lexeme itself is the token name.
    Keyword(String),
    /// From a `[...]` list; the lexeme (unescaped) is the token name.
    Punctuation(String),
    /// `name: body` — may reference other rules by name.
    Definition { name: String, body: String },
    /// `name = regex` — flat regex, no name references.
    Pattern { name: String, regex: String },
}

impl Rule {
    pub fn token_name(&self) -> String {
        match self {
            Rule::Keyword(word) => word.clone(),
            Rule::Punctuation(lexeme) => lexeme.replace('\\', ""),
            Rule::Definition { name, .. } | Rule::Pattern { name, .. } => name.clone(),
        }
    }
}

/// Splits raw rule text into rule records. Empty lines are skipped.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>, RuleError> {
    let mut rules = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') && line.ends_with('}') {
            let inner = &line[1..line.len() - 1];
            rules.extend(inner.split_whitespace().map(|w| Rule::Keyword(w.to_owned())));
        } else if line.starts_with('[') && line.ends_with(']') {
            let inner = &line[1..line.len() - 1];
            rules.extend(
                inner
                    .split_whitespace()
                    .map(|p| Rule::Punctuation(p.to_owned())),
            );
        } else if first_word_ends_with_colon(line) {
            let (name, body) = line
                .split_once(':')
                .ok_or_else(|| RuleError::MalformedLine(line.to_owned()))?;
            rules.push(Rule::Definition {
                name: name.trim().to_owned(),
                body: body.trim().to_owned(),
            });
        } else if line.contains('=') {
            let (name, pattern) = line
                .split_once('=')
                .ok_or_else(|| RuleError::MalformedLine(line.to_owned()))?;
            rules.push(Rule::Pattern {
                name: name.trim().to_owned(),
                regex: pattern.chars().filter(|c| !c.is_whitespace()).collect(),
            });
        } else {
            return Err(RuleError::MalformedLine(line.to_owned()));
        }
    }
    Ok(rules)
}

fn first_word_ends_with_colon(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|word| word.ends_with(':'))
}

/// Every rule compiled to its own minimized DFA (in rule order), plus the
/// token priority table.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub automata: Vec<Automaton>,
    pub priorities: BTreeMap<String, i32>,
}

impl CompiledRules {
    /// Union of every rule DFA, re-determinized and minimized into the final
    /// scanner DFA. Accepting states keep the candidate set of every rule
    /// that folded into them.
    pub fn combined_dfa(&self) -> Automaton {
        let nfa = ops::union_all(&self.automata);
        convert::minimize(&convert::to_dfa(&nfa))
    }

    pub fn table(&self) -> DfaTable {
        DfaTable::from_dfa(&self.combined_dfa())
    }
}

/// Compiles a rule list. Keywords, punctuation and flat regexes compile
/// immediately; regular definitions that reference a name not yet compiled
/// are pushed onto a backlog and retried, so forward references among rules
/// resolve as long as the reference graph is acyclic. A rule that still
/// fails after as many retries as there are rules can never resolve.
pub fn compile_rules(rules: &[Rule]) -> Result<CompiledRules, RuleError> {
    let max_retries = rules.len();
    let demotion = demotion_levels(rules);
    let mut defs: HashMap<String, Automaton> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut priorities: BTreeMap<String, i32> = BTreeMap::new();
    let mut backlog: VecDeque<(String, String, usize)> = VecDeque::new();

    for (position, rule) in rules.iter().enumerate() {
        let token = rule.token_name();
        let priority = match rule {
            Rule::Keyword(_) | Rule::Punctuation(_) => LITERAL_PRIORITY_BASE - position as i32,
            Rule::Definition { .. } | Rule::Pattern { .. } => {
                NAMED_PRIORITY_BASE
                    - demotion.get(&token).copied().unwrap_or(0) * REFERENCED_DEMOTION
                    - position as i32
            }
        };
        priorities.insert(token.clone(), priority);
        order.push(token.clone());

        match rule {
            Rule::Keyword(word) | Rule::Punctuation(word) => {
                let a = regex::regex_to_min_dfa(word, &token).map_err(|source| {
                    RuleError::Regex {
                        name: token.clone(),
                        source,
                    }
                })?;
                defs.insert(token, a);
            }
            Rule::Pattern { regex, .. } => {
                let a = regex::regex_to_min_dfa(regex, &token).map_err(|source| {
                    RuleError::Regex {
                        name: token.clone(),
                        source,
                    }
                })?;
                defs.insert(token, a);
            }
            Rule::Definition { body, .. } => {
                match try_definition(&token, body, &defs)? {
                    Some(a) => {
                        defs.insert(token, a);
                    }
                    None => backlog.push_back((token, body.clone(), 0)),
                }
            }
        }
    }

    while let Some((token, body, retries)) = backlog.pop_front() {
        match try_definition(&token, &body, &defs)? {
            Some(a) => {
                defs.insert(token, a);
            }
            None if retries < max_retries => backlog.push_back((token, body, retries + 1)),
            None => return Err(RuleError::Unresolvable(token)),
        }
    }

    let automata = order
        .iter()
        .map(|name| defs[name].clone())
        .collect();
    Ok(CompiledRules {
        automata,
        priorities,
    })
}

/// How many bands each named rule is demoted by: a rule referenced from a
/// regular definition sits one level below that definition, transitively, so
/// referencing rules always outrank the helpers they are built from. The
/// propagation converges because the reference graph of a compilable rule set
/// is acyclic.
fn demotion_levels(rules: &[Rule]) -> HashMap<String, i32> {
    let mut references: Vec<(String, Vec<String>)> = Vec::new();
    for rule in rules {
        if let Rule::Definition { name, body } = rule {
            let referenced = regex::tokenize_definition(body)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| match t {
                    Tok::Name(n) => Some(n),
                    _ => None,
                })
                .collect();
            references.push((name.clone(), referenced));
        }
    }

    let mut levels: HashMap<String, i32> =
        rules.iter().map(|rule| (rule.token_name(), 0)).collect();
    for _ in 0..rules.len() {
        let mut changed = false;
        for (name, referenced) in &references {
            let below = levels.get(name).copied().unwrap_or(0) + 1;
            for helper in referenced {
                if let Some(level) = levels.get_mut(helper) {
                    if *level < below {
                        *level = below;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    levels
}

fn try_definition(
    token: &str,
    body: &str,
    defs: &HashMap<String, Automaton>,
) -> Result<Option<Automaton>, RuleError> {
    regex::definition_to_min_dfa(body, token, defs).map_err(|source| RuleError::Regex {
        name: token.to_owned(),
        source,
    })
}

/// One `name value` line per token, in map order.
pub fn export_priorities(priorities: &BTreeMap<String, i32>) -> String {
    let mut out = String::new();
    for (name, value) in priorities {
        out.push_str(name);
        out.push(' ');
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}

pub fn import_priorities(text: &str) -> Result<BTreeMap<String, i32>, RuleError> {
    let mut priorities = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .rsplit_once(' ')
            .ok_or_else(|| RuleError::MalformedPriority(line.to_owned()))?;
        let value: i32 = value
            .parse()
            .map_err(|_| RuleError::MalformedPriority(line.to_owned()))?;
        priorities.insert(name.to_owned(), value);
    }
    Ok(priorities)
}
