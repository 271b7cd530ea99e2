//! Predicate text parsing and rendering.
//!
//! The HTTP API and the tests write predicates as text; on the wire they
//! travel as [`crate::proto::Predicate`] trees. [`parse_predicate`] builds the
//! tree and [`display`] renders one back for logs.

mod parser;

pub use parser::{
    parse_predicate, tag_key_bytes, FIELD_IDENT, MAX_PREDICATE_DEPTH, MEASUREMENT_IDENT,
};

use crate::proto::{node, Node, Predicate, TAG_KEY_FIELD, TAG_KEY_MEASUREMENT};

use std::fmt::{self, Write};

/// Renders a predicate in the text syntax accepted by [`parse_predicate`].
pub struct PredicateDisplay<'a>(&'a Predicate);

/// `Display` adapter for a predicate; absent roots render as `<all>`.
pub fn display(predicate: &Predicate) -> PredicateDisplay<'_> {
    PredicateDisplay(predicate)
}

impl fmt::Display for PredicateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.root {
            Some(root) => write_node(f, root),
            None => write!(f, "<all>"),
        }
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, n: &Node) -> fmt::Result {
    match &n.value {
        Some(node::Value::Logical(op)) => {
            let op = match node::Logical::try_from(*op) {
                Ok(node::Logical::And) => "and",
                Ok(node::Logical::Or) => "or",
                Err(_) => "?",
            };
            write_children(f, &n.children, op)
        }
        Some(node::Value::Comparison(op)) => {
            let op = match node::Comparison::try_from(*op) {
                Ok(node::Comparison::Equal) => "=",
                Ok(node::Comparison::NotEqual) => "!=",
                Ok(node::Comparison::StartsWith) => "^=",
                Ok(node::Comparison::Regex) => "=~",
                Ok(node::Comparison::NotRegex) => "!~",
                Ok(node::Comparison::Lt) => "<",
                Ok(node::Comparison::Lte) => "<=",
                Ok(node::Comparison::Gt) => ">",
                Ok(node::Comparison::Gte) => ">=",
                Err(_) => "?",
            };
            write_children(f, &n.children, op)
        }
        Some(node::Value::TagRefValue(key)) => match key.as_slice() {
            TAG_KEY_MEASUREMENT => write!(f, "{}", MEASUREMENT_IDENT),
            TAG_KEY_FIELD => write!(f, "{}", FIELD_IDENT),
            other => write!(f, "{}", String::from_utf8_lossy(other)),
        },
        Some(node::Value::StringValue(s)) => write_quoted(f, s),
        // `/.../` only keeps `\/` as an escape, so anything that would need one
        // falls back to the quoted form, which the parser also accepts for regexes.
        Some(node::Value::RegexValue(r)) if r.contains('/') || r.ends_with('\\') => {
            write_quoted(f, r)
        }
        Some(node::Value::RegexValue(r)) => write!(f, "/{}/", r),
        Some(node::Value::FieldRefValue(name)) => write!(f, "{}", name),
        Some(node::Value::BoolValue(b)) => write!(f, "{}", b),
        Some(node::Value::IntValue(i)) => write!(f, "{}", i),
        Some(node::Value::UintValue(u)) => write!(f, "{}", u),
        Some(node::Value::FloatValue(v)) => write!(f, "{}", v),
        None => {
            write!(f, "(")?;
            for child in &n.children {
                write_node(f, child)?;
            }
            write!(f, ")")
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[Node], op: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write_node(f, child)?;
    }
    Ok(())
}
