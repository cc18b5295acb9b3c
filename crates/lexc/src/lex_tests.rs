use std::collections::BTreeMap;

use crate::predictor::Predictor;
use crate::regex::{self, insert_concat, to_postfix, tokenize_regex, Op, Tok};
use crate::rules::{self, Rule, RuleError};
use crate::table::DfaTable;

fn run_vectors(tests: &[(&str, bool)], pattern: &str) {
    let dfa = regex::regex_to_min_dfa(pattern, "t").expect("failed to compile regex");
    for (input, expected) in tests {
        let (accepted, _) = dfa.simulate(input);
        assert_eq!(
            accepted, *expected,
            "'{}' failed on input '{}', expect match: {}, actual match: {}",
            pattern, input, expected, accepted
        );
    }
}

fn lexer(rule_text: &str) -> (DfaTable, BTreeMap<String, i32>) {
    let rules = rules::parse_rules(rule_text).expect("failed to parse rules");
    let compiled = rules::compile_rules(&rules).expect("failed to compile rules");
    (compiled.table(), compiled.priorities)
}

fn tokens_of(rule_text: &str, program: &str) -> Vec<(String, String)> {
    let (table, priorities) = lexer(rule_text);
    Predictor::new(table, priorities, program)
        .map(|t| (t.name, t.lexeme))
        .collect()
}

#[test]
fn basic_regex() {
    let test_vectors = [
        ("a", true),
        ("b", false),
        ("x", false),
        ("ab", true),
        ("ac", true),
        ("abcbc", true),
        ("acbcb", true),
        ("bcbc", false),
        ("abbbbbbbbbb", true),
    ];
    run_vectors(&test_vectors, "a(b|c)*");
}

#[test]
fn range_regex() {
    let test_vectors = [
        ("a", true),
        ("abcd", true),
        ("dcba", true),
        ("e", false),
        ("", false),
    ];
    run_vectors(&test_vectors, "(a-d)+");
}

#[test]
fn escaped_operator_regex() {
    let test_vectors = [("+12", true), ("12", false), ("+", false)];
    run_vectors(&test_vectors, "\\+(0-9)+");
}

#[test]
fn epsilon_alternative_regex() {
    let test_vectors = [("b", true), ("ab", true), ("a", false), ("", false)];
    run_vectors(&test_vectors, "(a|\\L)b");
}

#[test]
fn explicit_concat_and_postfix() {
    let tokens = tokenize_regex("ab|c*").expect("tokenize failed");
    let tokens = insert_concat(tokens);
    assert_eq!(
        tokens,
        vec![
            Tok::Literal('a'),
            Tok::Op(Op::Concat),
            Tok::Literal('b'),
            Tok::Op(Op::Union),
            Tok::Literal('c'),
            Tok::Op(Op::Star),
        ]
    );
    // ab|c* => ab. c* |
    assert_eq!(
        to_postfix(tokens).expect("postfix failed"),
        vec![
            Tok::Literal('a'),
            Tok::Literal('b'),
            Tok::Op(Op::Concat),
            Tok::Literal('c'),
            Tok::Op(Op::Star),
            Tok::Op(Op::Union),
        ]
    );
}

#[test]
fn malformed_regex_is_rejected() {
    assert!(regex::regex_to_min_dfa("(ab", "t").is_err());
    assert!(regex::regex_to_min_dfa("a|", "t").is_err());
    assert!(regex::regex_to_min_dfa("", "t").is_err());
    // Descending range.
    assert!(regex::regex_to_min_dfa("z-a", "t").is_err());
}

#[test]
fn parse_rule_lines() {
    let rules = rules::parse_rules("{if else}\n[; \\( \\)]\ndigit = 0-9\nid: letter+\n")
        .expect("failed to parse rules");
    assert_eq!(
        rules,
        vec![
            Rule::Keyword("if".to_owned()),
            Rule::Keyword("else".to_owned()),
            Rule::Punctuation(";".to_owned()),
            Rule::Punctuation("\\(".to_owned()),
            Rule::Punctuation("\\)".to_owned()),
            Rule::Pattern {
                name: "digit".to_owned(),
                regex: "0-9".to_owned(),
            },
            Rule::Definition {
                name: "id".to_owned(),
                body: "letter+".to_owned(),
            },
        ]
    );
    assert_eq!(rules[3].token_name(), "(");
}

#[test]
fn longest_match_beats_keyword_prefix() {
    let rule_text = "{if}\nid = (a-z)+\n";
    assert_eq!(
        tokens_of(rule_text, "iffy"),
        vec![("id".to_owned(), "iffy".to_owned())]
    );
    assert_eq!(
        tokens_of(rule_text, "if x"),
        vec![
            ("if".to_owned(), "if".to_owned()),
            ("id".to_owned(), "x".to_owned()),
        ]
    );
}

#[test]
fn priority_breaks_candidate_ties() {
    let rule_text = "A = ab\nB = ab\n";
    let (table, _) = lexer(rule_text);

    let mut priorities = BTreeMap::new();
    priorities.insert("A".to_owned(), 1);
    priorities.insert("B".to_owned(), 2);
    let tokens: Vec<_> = Predictor::new(table.clone(), priorities, "ab")
        .map(|t| t.name)
        .collect();
    assert_eq!(tokens, vec!["B".to_owned()]);

    // File order decides when no explicit priorities favor either.
    let (_, default_priorities) = lexer(rule_text);
    let tokens: Vec<_> = Predictor::new(table, default_priorities, "ab")
        .map(|t| t.name)
        .collect();
    assert_eq!(tokens, vec!["A".to_owned()]);
}

#[test]
fn forward_reference_resolves_through_backlog() {
    // "word" references "stem" before "stem" is defined.
    let rule_text = "word: stem b\nstem: a+\n";
    assert_eq!(
        tokens_of(rule_text, "aab"),
        vec![("word".to_owned(), "aab".to_owned())]
    );
}

#[test]
fn unresolvable_reference_is_reported() {
    let rules = rules::parse_rules("word: stem b\n").expect("failed to parse rules");
    match rules::compile_rules(&rules) {
        Err(RuleError::Unresolvable(name)) => assert_eq!(name, "word"),
        other => panic!("expected unresolvable rule error, got {:?}", other),
    }
}

#[test]
fn definitions_outrank_their_references() {
    // "y" is accepted by both the helper and the composite rule built on it;
    // the composite's token must win even though the helper comes first.
    let rule_text = "letter = a-z\nid: letter letter*\nword: id !\n";
    let (_, priorities) = lexer(rule_text);
    assert!(priorities["id"] > priorities["letter"]);
    assert!(priorities["word"] > priorities["id"]);
    assert_eq!(
        tokens_of(rule_text, "y"),
        vec![("id".to_owned(), "y".to_owned())]
    );
}

#[test]
fn unlexable_characters_are_skipped() {
    let rule_text = "id = (a-z)+\n";
    assert_eq!(
        tokens_of(rule_text, "ab @# cd"),
        vec![
            ("id".to_owned(), "ab".to_owned()),
            ("id".to_owned(), "cd".to_owned()),
        ]
    );
}

#[test]
fn dead_state_always_terminates() {
    // 'a' is in the alphabet but "aa" drives the scan into the dead sink
    // with no candidate on the stack; the index must still advance.
    let rule_text = "x = ab\n";
    assert_eq!(tokens_of(rule_text, "aa"), vec![]);
    assert_eq!(
        tokens_of(rule_text, "aaab"),
        vec![("x".to_owned(), "ab".to_owned())]
    );
}

#[test]
fn table_round_trips_through_bytes() {
    let (table, _) = lexer("{if}\nid = (a-z)+\n");
    let bytes = table.to_bytes().expect("encode failed");
    let reloaded = DfaTable::from_bytes(&bytes).expect("decode failed");
    assert_eq!(table, reloaded);

    // Every matrix lookup must agree through the decoded copy.
    let columns = table.symbols().count();
    for state in 0..table.num_states() as u32 {
        for j in 0..columns {
            assert_eq!(table.next_state(state, j), reloaded.next_state(state, j));
        }
    }
}

#[test]
fn priorities_round_trip_through_text() {
    let rules = rules::parse_rules("{if}\nid = (a-z)+\n").expect("failed to parse rules");
    let compiled = rules::compile_rules(&rules).expect("failed to compile rules");
    let exported = rules::export_priorities(&compiled.priorities);
    let imported = rules::import_priorities(&exported).expect("import failed");
    assert_eq!(compiled.priorities, imported);
}

#[test]
fn small_language_end_to_end() {
    let rule_text = "\
{if else while}
[; = \\( \\)]
digit = 0-9
letter = a-z|A-Z
id: letter (letter|digit)*
num: digit+
";
    let expected = [
        ("while", "while"),
        ("(", "("),
        ("id", "x1"),
        ("=", "="),
        ("num", "10"),
        (")", ")"),
        ("id", "y"),
        (";", ";"),
    ];
    let actual = tokens_of(rule_text, "while (x1 = 10) y;");
    let actual: Vec<(&str, &str)> = actual
        .iter()
        .map(|(n, l)| (n.as_str(), l.as_str()))
        .collect();
    assert_eq!(actual, expected);
}
