//! Predicate expression trees over series tags.

/// A boolean filter over series metadata. An absent root matches nothing in
/// particular; callers model "match all" by omitting the predicate entirely.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Predicate {
    #[prost(message, optional, tag = "1")]
    pub root: ::core::option::Option<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(enumeration = "node::Type", tag = "1")]
    pub node_type: i32,
    #[prost(message, repeated, tag = "2")]
    pub children: ::prost::alloc::vec::Vec<Node>,
    #[prost(oneof = "node::Value", tags = "3, 4, 5, 6, 7, 8, 9, 10, 11, 12")]
    pub value: ::core::option::Option<node::Value>,
}

/// Nested message and enum types in `Node`.
pub mod node {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        LogicalExpression = 0,
        ComparisonExpression = 1,
        ParenExpression = 2,
        TagRef = 3,
        Literal = 4,
        FieldRef = 5,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Comparison {
        Equal = 0,
        NotEqual = 1,
        StartsWith = 2,
        Regex = 3,
        NotRegex = 4,
        Lt = 5,
        Lte = 6,
        Gt = 7,
        Gte = 8,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Logical {
        And = 0,
        Or = 1,
    }

    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "3")]
        StringValue(::prost::alloc::string::String),
        #[prost(bool, tag = "4")]
        BoolValue(bool),
        #[prost(int64, tag = "5")]
        IntValue(i64),
        #[prost(uint64, tag = "6")]
        UintValue(u64),
        #[prost(double, tag = "7")]
        FloatValue(f64),
        #[prost(string, tag = "8")]
        RegexValue(::prost::alloc::string::String),
        #[prost(bytes = "vec", tag = "9")]
        TagRefValue(::prost::alloc::vec::Vec<u8>),
        #[prost(string, tag = "10")]
        FieldRefValue(::prost::alloc::string::String),
        #[prost(enumeration = "Logical", tag = "11")]
        Logical(i32),
        #[prost(enumeration = "Comparison", tag = "12")]
        Comparison(i32),
    }
}

impl Predicate {
    pub fn new(root: Node) -> Self {
        Self { root: Some(root) }
    }
}

impl Node {
    pub fn tag_ref(key: impl Into<Vec<u8>>) -> Self {
        Self {
            node_type: node::Type::TagRef as i32,
            children: Vec::new(),
            value: Some(node::Value::TagRefValue(key.into())),
        }
    }

    pub fn string_literal(value: impl Into<String>) -> Self {
        Self {
            node_type: node::Type::Literal as i32,
            children: Vec::new(),
            value: Some(node::Value::StringValue(value.into())),
        }
    }

    pub fn regex_literal(pattern: impl Into<String>) -> Self {
        Self {
            node_type: node::Type::Literal as i32,
            children: Vec::new(),
            value: Some(node::Value::RegexValue(pattern.into())),
        }
    }

    pub fn comparison(op: node::Comparison, left: Node, right: Node) -> Self {
        Self {
            node_type: node::Type::ComparisonExpression as i32,
            children: vec![left, right],
            value: Some(node::Value::Comparison(op as i32)),
        }
    }

    pub fn logical(op: node::Logical, left: Node, right: Node) -> Self {
        Self {
            node_type: node::Type::LogicalExpression as i32,
            children: vec![left, right],
            value: Some(node::Value::Logical(op as i32)),
        }
    }

    pub fn paren(inner: Node) -> Self {
        Self {
            node_type: node::Type::ParenExpression as i32,
            children: vec![inner],
            value: None,
        }
    }

    /// `key = "value"`
    pub fn tag_eq(key: impl Into<Vec<u8>>, value: impl Into<String>) -> Self {
        Self::comparison(
            node::Comparison::Equal,
            Self::tag_ref(key),
            Self::string_literal(value),
        )
    }

    pub fn and(left: Node, right: Node) -> Self {
        Self::logical(node::Logical::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Self {
        Self::logical(node::Logical::Or, left, right)
    }
}
