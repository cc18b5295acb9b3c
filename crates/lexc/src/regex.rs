// Regex front-end: raw pattern text in, minimized per-rule DFA out.
//
// The operator set is deliberately small (EBNF over single characters):
//
// <regex> ::= <term> '|' <regex> | <term>
// <term>  ::= { <factor> }                 (juxtaposition = concatenation)
// <factor> ::= <base> { '*' | '+' }
// <base>  ::= <char> | <char> '-' <char> | '\' <char> | '(' <regex> ')'
//
// '\L' denotes the empty string; inside regular definitions a multi-letter
// word is a reference to a previously compiled rule.

use std::collections::HashMap;
use std::iter::Peekable;

use thiserror::Error;

use lexc_fa::{convert, ops, Automaton};

#[derive(Debug, Error)]
pub enum RegexError {
    #[error("malformed regex")]
    Malformed,
    #[error("range endpoints must be single characters")]
    BadRange,
}

/// Operator kinds, in place of branching on raw operator characters.
/// Escapes are resolved during tokenization and never reach the operator
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Union,
    Concat,
    Star,
    Plus,
    Range,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Star | Op::Plus => 4,
            Op::Range => 3,
            Op::Concat => 2,
            Op::Union => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tok {
    Literal(char),
    Epsilon,
    Name(String),
    Op(Op),
    LParen,
    RParen,
}

fn escape_code(code: char) -> char {
    match code {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'a' => '\x07',
        'f' => '\x0C',
        'v' => '\x0B',
        other => other,
    }
}

fn operator_token(c: char) -> Option<Tok> {
    match c {
        '|' => Some(Tok::Op(Op::Union)),
        '*' => Some(Tok::Op(Op::Star)),
        '+' => Some(Tok::Op(Op::Plus)),
        '-' => Some(Tok::Op(Op::Range)),
        '(' => Some(Tok::LParen),
        ')' => Some(Tok::RParen),
        _ => None,
    }
}

/// Tokenizes a flat regex: every non-operator character is a literal.
pub(crate) fn tokenize_regex(pattern: &str) -> Result<Vec<Tok>, RegexError> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let code = chars.next().ok_or(RegexError::Malformed)?;
            tokens.push(if code == 'L' {
                Tok::Epsilon
            } else {
                Tok::Literal(escape_code(code))
            });
        } else if let Some(op) = operator_token(c) {
            tokens.push(op);
        } else if !c.is_whitespace() {
            tokens.push(Tok::Literal(c));
        }
    }
    Ok(tokens)
}

/// Tokenizes a regular definition. Unlike a flat regex, a run of two or more
/// word characters is a reference to another rule by name; a single word
/// character is still a literal.
pub(crate) fn tokenize_definition(definition: &str) -> Result<Vec<Tok>, RegexError> {
    let mut tokens = Vec::new();
    let mut chars = definition.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == '\\' {
            chars.next();
            let code = chars.next().ok_or(RegexError::Malformed)?;
            tokens.push(if code == 'L' {
                Tok::Epsilon
            } else {
                Tok::Literal(escape_code(code))
            });
        } else if let Some(op) = operator_token(c) {
            chars.next();
            tokens.push(op);
        } else if c.is_whitespace() {
            chars.next();
        } else if is_word_char(c) {
            let word = take_word(&mut chars);
            let mut word_chars = word.chars();
            match (word_chars.next(), word_chars.next()) {
                (Some(only), None) => tokens.push(Tok::Literal(only)),
                _ => tokens.push(Tok::Name(word)),
            }
        } else {
            chars.next();
            tokens.push(Tok::Literal(c));
        }
    }
    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn take_word<I>(chars: &mut Peekable<I>) -> String
where
    I: Iterator<Item = char>,
{
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if !is_word_char(c) {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

fn ends_operand(t: &Tok) -> bool {
    matches!(
        t,
        Tok::Literal(_)
            | Tok::Epsilon
            | Tok::Name(_)
            | Tok::RParen
            | Tok::Op(Op::Star)
            | Tok::Op(Op::Plus)
    )
}

fn starts_operand(t: &Tok) -> bool {
    matches!(t, Tok::Literal(_) | Tok::Epsilon | Tok::Name(_) | Tok::LParen)
}

/// Inserts the explicit concatenation operator wherever juxtaposition
/// implies it: operand-operand, operand-open-paren, close-paren-operand and
/// closure-operand boundaries.
pub(crate) fn insert_concat(tokens: Vec<Tok>) -> Vec<Tok> {
    let mut out: Vec<Tok> = Vec::with_capacity(tokens.len() * 2);
    for token in tokens {
        if let Some(last) = out.last() {
            if ends_operand(last) && starts_operand(&token) {
                out.push(Tok::Op(Op::Concat));
            }
        }
        out.push(token);
    }
    out
}

/// Shunting-yard conversion to postfix. Operators are left-associative; an
/// operator on the stack with greater-or-equal precedence is emitted before a
/// new one is pushed.
pub(crate) fn to_postfix(tokens: Vec<Tok>) -> Result<Vec<Tok>, RegexError> {
    let mut output: Vec<Tok> = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Tok> = Vec::new();

    for token in tokens {
        match token {
            Tok::Literal(_) | Tok::Epsilon | Tok::Name(_) => output.push(token),
            Tok::LParen => stack.push(Tok::LParen),
            Tok::RParen => loop {
                match stack.pop() {
                    Some(Tok::LParen) => break,
                    Some(op) => output.push(op),
                    None => return Err(RegexError::Malformed),
                }
            },
            Tok::Op(op) => {
                while let Some(Tok::Op(top)) = stack.last() {
                    if top.precedence() >= op.precedence() {
                        let top = stack.pop().expect("stack top checked above");
                        output.push(top);
                    } else {
                        break;
                    }
                }
                stack.push(Tok::Op(op));
            }
        }
    }

    while let Some(token) = stack.pop() {
        if token == Tok::LParen {
            return Err(RegexError::Malformed);
        }
        output.push(token);
    }
    Ok(output)
}

/// Stack evaluation of a postfix token stream into an NFA.
///
/// Returns `Ok(None)` when a name reference is not yet present in `defs`;
/// the caller is expected to defer the whole rule and retry once more
/// definitions have been compiled.
pub(crate) fn postfix_to_automaton(
    postfix: &[Tok],
    defs: &HashMap<String, Automaton>,
) -> Result<Option<Automaton>, RegexError> {
    let mut stack: Vec<Automaton> = Vec::new();

    for token in postfix {
        match token {
            Tok::Literal(c) => stack.push(Automaton::single(*c, None)),
            Tok::Epsilon => stack.push(Automaton::epsilon()),
            Tok::Name(name) => match defs.get(name) {
                Some(a) => stack.push(a.clone()),
                None => return Ok(None),
            },
            Tok::Op(Op::Star) => {
                let a = stack.pop().ok_or(RegexError::Malformed)?;
                stack.push(ops::kleene_closure(&a, None));
            }
            Tok::Op(Op::Plus) => {
                let a = stack.pop().ok_or(RegexError::Malformed)?;
                stack.push(ops::positive_closure(&a, None));
            }
            Tok::Op(Op::Union) => {
                let a2 = stack.pop().ok_or(RegexError::Malformed)?;
                let a1 = stack.pop().ok_or(RegexError::Malformed)?;
                stack.push(ops::union(&a1, &a2, None));
            }
            Tok::Op(Op::Concat) => {
                let a2 = stack.pop().ok_or(RegexError::Malformed)?;
                let a1 = stack.pop().ok_or(RegexError::Malformed)?;
                stack.push(ops::concat(&a1, &a2, None));
            }
            Tok::Op(Op::Range) => {
                let high = single_char(&stack.pop().ok_or(RegexError::Malformed)?)?;
                let low = single_char(&stack.pop().ok_or(RegexError::Malformed)?)?;
                if low > high {
                    return Err(RegexError::BadRange);
                }
                let mut all = Automaton::single(low, None);
                for c in (low..=high).skip(1) {
                    all = ops::union(&all, &Automaton::single(c, None), None);
                }
                stack.push(all);
            }
            Tok::LParen | Tok::RParen => unreachable!("parentheses removed by postfix pass"),
        }
    }

    if stack.len() == 1 {
        Ok(stack.pop())
    } else {
        Err(RegexError::Malformed)
    }
}

fn single_char(a: &Automaton) -> Result<char, RegexError> {
    let mut symbols = a.alphabet().iter();
    match (symbols.next(), symbols.next()) {
        (Some(&c), None) => Ok(c),
        _ => Err(RegexError::BadRange),
    }
}

fn compile_tokens(
    tokens: Vec<Tok>,
    defs: &HashMap<String, Automaton>,
    token_name: &str,
    source: &str,
) -> Result<Option<Automaton>, RegexError> {
    if tokens.is_empty() {
        return Err(RegexError::Malformed);
    }
    let postfix = to_postfix(insert_concat(tokens))?;
    let nfa = match postfix_to_automaton(&postfix, defs)? {
        Some(nfa) => nfa,
        None => return Ok(None),
    };
    let dfa = convert::to_dfa(&nfa);
    let mut min = convert::minimize(&dfa);
    min.set_token(token_name);
    min.set_regex(source);
    Ok(Some(min))
}

/// Compiles a flat regex (no name references) to a minimized DFA whose
/// accepting states announce `token_name`.
pub fn regex_to_min_dfa(pattern: &str, token_name: &str) -> Result<Automaton, RegexError> {
    let tokens = tokenize_regex(pattern)?;
    compile_tokens(tokens, &HashMap::new(), token_name, pattern)?.ok_or(RegexError::Malformed)
}

/// Compiles a regular definition, resolving name references against `defs`.
/// `Ok(None)` means a referenced name is not yet defined and the rule should
/// be retried later.
pub fn definition_to_min_dfa(
    definition: &str,
    token_name: &str,
    defs: &HashMap<String, Automaton>,
) -> Result<Option<Automaton>, RegexError> {
    let tokens = tokenize_definition(definition)?;
    compile_tokens(tokens, defs, token_name, definition.trim())
}
