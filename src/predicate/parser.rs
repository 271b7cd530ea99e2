//! Text predicates like `_m = "cpu" and (host = "a" or host =~ /^web-/)`.

use crate::proto::{node, Node, Predicate, TAG_KEY_FIELD, TAG_KEY_MEASUREMENT};
use crate::{Error, Result};

use std::iter::Peekable;
use std::str::CharIndices;

/// Identifier that refers to the measurement name.
pub const MEASUREMENT_IDENT: &str = "_m";

/// Identifier that refers to the field name.
pub const FIELD_IDENT: &str = "_f";

/// Deepest parenthesis nesting accepted by [`parse_predicate`].
pub const MAX_PREDICATE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Regex(String),
    LParen,
    RParen,
    Eq,
    NotEq,
    RegexMatch,
    RegexNotMatch,
    And,
    Or,
}

/// Parse a text predicate into its protobuf expression tree.
pub fn parse_predicate(input: &str) -> Result<Predicate> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::Predicate("empty predicate".to_string()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let root = parser.expr()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(Error::Predicate(format!(
            "unexpected {:?} at offset {}",
            token, offset
        )));
    }
    Ok(Predicate::new(root))
}

/// Map a predicate identifier to the tag key bytes used on the wire.
pub fn tag_key_bytes(ident: &str) -> Vec<u8> {
    match ident {
        MEASUREMENT_IDENT => TAG_KEY_MEASUREMENT.to_vec(),
        FIELD_IDENT => TAG_KEY_FIELD.to_vec(),
        other => other.as_bytes().to_vec(),
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((offset, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((offset, Token::RParen));
            }
            '=' => {
                chars.next();
                if next_is(&mut chars, '~') {
                    tokens.push((offset, Token::RegexMatch));
                } else {
                    tokens.push((offset, Token::Eq));
                }
            }
            '!' => {
                chars.next();
                if next_is(&mut chars, '=') {
                    tokens.push((offset, Token::NotEq));
                } else if next_is(&mut chars, '~') {
                    tokens.push((offset, Token::RegexNotMatch));
                } else {
                    return Err(Error::Predicate(format!(
                        "expected '!=' or '!~' at offset {}",
                        offset
                    )));
                }
            }
            '"' => {
                chars.next();
                let value = read_delimited(&mut chars, '"', offset)?;
                tokens.push((offset, Token::Str(value)));
            }
            '/' => {
                chars.next();
                let value = read_delimited(&mut chars, '/', offset)?;
                tokens.push((offset, Token::Regex(value)));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match ident.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(ident),
                };
                tokens.push((offset, token));
            }
            other => {
                return Err(Error::Predicate(format!(
                    "unexpected character '{}' at offset {}",
                    other, offset
                )));
            }
        }
    }

    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    if matches!(chars.peek(), Some(&(_, c)) if c == expected) {
        chars.next();
        true
    } else {
        false
    }
}

/// Read up to the closing `delim`; `\delim` and `\\` are escapes.
fn read_delimited(
    chars: &mut Peekable<CharIndices<'_>>,
    delim: char,
    start: usize,
) -> Result<String> {
    let mut value = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, next)) if next == delim || next == '\\' && delim == '"' => {
                    value.push(next)
                }
                Some((_, next)) => {
                    value.push('\\');
                    value.push(next);
                }
                None => break,
            },
            c if c == delim => return Ok(value),
            c => value.push(c),
        }
    }
    Err(Error::Predicate(format!(
        "unterminated literal starting at offset {}",
        start
    )))
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    /// Open parentheses enclosing the current position
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn expr(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.term()?;
            left = Node::or(left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node> {
        let mut left = self.factor()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.factor()?;
            left = Node::and(left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Node> {
        match self.advance() {
            Some((offset, Token::LParen)) => {
                if self.depth == MAX_PREDICATE_DEPTH {
                    return Err(Error::Predicate(format!(
                        "parentheses nested deeper than {} at offset {}",
                        MAX_PREDICATE_DEPTH, offset
                    )));
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some((_, Token::RParen)) => Ok(Node::paren(inner)),
                    Some((offset, token)) => Err(Error::Predicate(format!(
                        "expected ')' but found {:?} at offset {}",
                        token, offset
                    ))),
                    None => Err(Error::Predicate("missing closing ')'".to_string())),
                }
            }
            Some((_, Token::Ident(ident))) => self.comparison(ident),
            Some((offset, token)) => Err(Error::Predicate(format!(
                "expected tag name or '(' but found {:?} at offset {}",
                token, offset
            ))),
            None => Err(Error::Predicate("unexpected end of predicate".to_string())),
        }
    }

    fn comparison(&mut self, ident: String) -> Result<Node> {
        let (op_offset, op) = self.advance().ok_or_else(|| {
            Error::Predicate(format!("expected operator after '{}'", ident))
        })?;
        let op = match op {
            Token::Eq => node::Comparison::Equal,
            Token::NotEq => node::Comparison::NotEqual,
            Token::RegexMatch => node::Comparison::Regex,
            Token::RegexNotMatch => node::Comparison::NotRegex,
            other => {
                return Err(Error::Predicate(format!(
                    "expected operator but found {:?} at offset {}",
                    other, op_offset
                )))
            }
        };

        let literal = match (op, self.advance()) {
            (node::Comparison::Equal | node::Comparison::NotEqual, Some((_, Token::Str(s)))) => {
                Node::string_literal(s)
            }
            (
                node::Comparison::Regex | node::Comparison::NotRegex,
                Some((_, Token::Str(s) | Token::Regex(s))),
            ) => Node::regex_literal(s),
            (_, Some((offset, token))) => {
                return Err(Error::Predicate(format!(
                    "unexpected {:?} at offset {} for comparison on '{}'",
                    token, offset, ident
                )))
            }
            (_, None) => {
                return Err(Error::Predicate(format!(
                    "expected literal after operator on '{}'",
                    ident
                )))
            }
        };

        Ok(Node::comparison(op, Node::tag_ref(tag_key_bytes(&ident)), literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_equality() {
        let pred = parse_predicate(r#"host = "a""#).unwrap();
        assert_eq!(pred, Predicate::new(Node::tag_eq("host", "a")));
    }

    #[test]
    fn measurement_ident_maps_to_magic_key() {
        let pred = parse_predicate(r#"_m = "cpu""#).unwrap();
        assert_eq!(
            pred,
            Predicate::new(Node::tag_eq(TAG_KEY_MEASUREMENT.to_vec(), "cpu"))
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let pred = parse_predicate(r#"host = "a" OR _m = "mem" and region = "west""#).unwrap();
        let expected = Node::or(
            Node::tag_eq("host", "a"),
            Node::and(
                Node::tag_eq(TAG_KEY_MEASUREMENT.to_vec(), "mem"),
                Node::tag_eq("region", "west"),
            ),
        );
        assert_eq!(pred, Predicate::new(expected));
    }

    #[test]
    fn parens_produce_paren_nodes() {
        let pred = parse_predicate(r#"(host = "a" or host = "b") and _f = "usage""#).unwrap();
        let expected = Node::and(
            Node::paren(Node::or(Node::tag_eq("host", "a"), Node::tag_eq("host", "b"))),
            Node::tag_eq(TAG_KEY_FIELD.to_vec(), "usage"),
        );
        assert_eq!(pred, Predicate::new(expected));
    }

    #[test]
    fn regex_operators_accept_slashes_and_quotes() {
        let pred = parse_predicate(r#"host =~ /^web-\/\d+/ and dc !~ "east""#).unwrap();
        let expected = Node::and(
            Node::comparison(
                node::Comparison::Regex,
                Node::tag_ref("host"),
                Node::regex_literal(r"^web-/\d+"),
            ),
            Node::comparison(
                node::Comparison::NotRegex,
                Node::tag_ref("dc"),
                Node::regex_literal("east"),
            ),
        );
        assert_eq!(pred, Predicate::new(expected));
    }

    #[test]
    fn string_escapes_are_unescaped() {
        let pred = parse_predicate(r#"name = "say \"hi\"""#).unwrap();
        assert_eq!(pred, Predicate::new(Node::tag_eq("name", r#"say "hi""#)));
    }

    #[test]
    fn rejects_bad_input() {
        for input in [
            "",
            "   ",
            r#"host = "a"#,
            r#"host "a""#,
            r#"host = /a/"#,
            r#"(host = "a""#,
            r#"host = "a" and"#,
            r#"host = "a" host = "b""#,
            r#"host ! "a""#,
            r#"host < "a""#,
        ] {
            let err = parse_predicate(input).unwrap_err();
            assert!(matches!(err, Error::Predicate(_)), "input {:?}", input);
        }
    }

    fn nested(depth: usize) -> String {
        format!("{}host = \"a\"{}", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let pred = parse_predicate(&nested(MAX_PREDICATE_DEPTH)).unwrap();
        let mut node = pred.root.unwrap();
        let mut parens = 0;
        while node.children.len() == 1 {
            node = node.children.remove(0);
            parens += 1;
        }
        assert_eq!(parens, MAX_PREDICATE_DEPTH);
        assert_eq!(node, Node::tag_eq("host", "a"));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        for depth in [MAX_PREDICATE_DEPTH + 1, 10_000] {
            let err = parse_predicate(&nested(depth)).unwrap_err();
            assert!(matches!(err, Error::Predicate(_)), "depth {}", depth);
        }
    }
}
