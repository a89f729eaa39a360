//! Core types: the positioned document tree.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Metadata key that names the governing schema.
pub const SCHEMA_KEY: &str = "$schema";

/// Field holding a node's child sequence in the instance form.
pub const CHILDREN_FIELD: &str = "children";

/// Field holding a node's kind in the instance form.
pub const KIND_FIELD: &str = "type";

/// Kind of the node holding the document header.
pub const METADATA_KIND: &str = "yaml";

/// Parsed document header.
pub type Metadata = Map<String, Value>;

/// Returns the JSON type name for error messages and schema synthesis.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A position in source text (line and column, 1-indexed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// The start of a document.
    pub const fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source range.
///
/// `end` is exclusive: it is the position just after the last character.
/// Byte offsets follow the same half-open convention, so
/// `&source[span.start_offset..span.end_offset]` is the spanned text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Span {
    /// Returns true if `other` lies entirely within this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start_offset <= other.start_offset
            && other.end_offset <= self.end_offset
            && self.start <= other.start
            && other.end <= self.end
    }

    /// Returns true if the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    /// Number of lines the span touches.
    pub fn line_count(&self) -> usize {
        self.end.line.saturating_sub(self.start.line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A positioned tree element.
///
/// The serialized form (used for `tree` dumps) includes `position`;
/// [`Node::to_instance`] is the form schemas are evaluated against.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(rename = "position")]
    pub span: Span,
}

/// One addressable property of a node.
///
/// The location resolver dispatches on this tag: only `Children` is an
/// ordered container of nodes, everything else is keyed data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldRef<'a> {
    Kind(&'a str),
    Children(&'a [Node]),
    Value(&'a Value),
}

impl Node {
    pub fn new(kind: impl Into<String>, span: Span) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
            children: Vec::new(),
            span,
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Look up a property by its instance-form name.
    ///
    /// An empty child list is not a property, matching [`Node::to_instance`].
    pub fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            KIND_FIELD => Some(FieldRef::Kind(&self.kind)),
            CHILDREN_FIELD if !self.children.is_empty() => Some(FieldRef::Children(&self.children)),
            CHILDREN_FIELD => None,
            _ => self.fields.get(name).map(FieldRef::Value),
        }
    }

    /// The header map, if this is a metadata node whose header parsed.
    pub fn metadata(&self) -> Option<&Metadata> {
        if self.kind != METADATA_KIND {
            return None;
        }
        self.fields.get("data").and_then(Value::as_object)
    }

    /// The plain JSON shape schemas are written against.
    ///
    /// `type` carries the kind, every field is a property, and `children`
    /// is present only when non-empty. Spans are not part of the instance.
    pub fn to_instance(&self) -> Value {
        let mut map = Map::new();
        map.insert(KIND_FIELD.to_string(), Value::String(self.kind.clone()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        if !self.children.is_empty() {
            map.insert(
                CHILDREN_FIELD.to_string(),
                Value::Array(self.children.iter().map(Node::to_instance).collect()),
            );
        }
        Value::Object(map)
    }

    /// Depth-first, pre-order walk over this node and its descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A parsed document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub root: Node,
    pub metadata: Option<Metadata>,
}

impl Document {
    /// The governing schema reference, if the header declares one.
    pub fn schema_ref(&self) -> Option<&str> {
        self.metadata.as_ref()?.get(SCHEMA_KEY)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn span(start: (usize, usize), end: (usize, usize), offsets: (usize, usize)) -> Span {
        Span {
            start: Position {
                line: start.0,
                column: start.1,
            },
            end: Position {
                line: end.0,
                column: end.1,
            },
            start_offset: offsets.0,
            end_offset: offsets.1,
        }
    }

    #[test]
    fn instance_form_flattens_fields() {
        let node = Node::new("heading", span((1, 1), (1, 8), (0, 7)))
            .with_field("depth", 1)
            .with_child(Node::new("text", span((1, 3), (1, 8), (2, 7))).with_field("value", "Title"));

        assert_eq!(
            node.to_instance(),
            json!({
                "type": "heading",
                "depth": 1,
                "children": [{ "type": "text", "value": "Title" }]
            })
        );
    }

    #[test]
    fn empty_children_are_not_a_field() {
        let node = Node::new("thematicBreak", span((1, 1), (1, 4), (0, 3)));
        assert!(node.field("children").is_none());
        assert!(node.to_instance().get("children").is_none());
    }

    #[test]
    fn field_dispatch() {
        let node = Node::new("code", span((1, 1), (3, 4), (0, 20)))
            .with_field("lang", "rust")
            .with_child(Node::new("text", span((2, 1), (2, 5), (8, 12))));

        assert_eq!(node.field("type"), Some(FieldRef::Kind("code")));
        assert!(matches!(node.field("children"), Some(FieldRef::Children(c)) if c.len() == 1));
        assert_eq!(node.field("lang"), Some(FieldRef::Value(&json!("rust"))));
        assert_eq!(node.field("missing"), None);
    }

    #[test]
    fn span_containment() {
        let outer = span((1, 1), (4, 1), (0, 30));
        let inner = span((2, 1), (3, 5), (10, 20));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert_eq!(inner.line_count(), 2);
    }

    #[test]
    fn walk_is_preorder() {
        let leaf = |kind: &str| Node::new(kind, Span::default());
        let root = leaf("root")
            .with_child(leaf("a").with_child(leaf("a1")))
            .with_child(leaf("b"));
        let kinds: Vec<&str> = root.walk().map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn metadata_only_on_yaml_nodes() {
        let yaml = Node::new(METADATA_KIND, Span::default()).with_field("data", json!({"a": 1}));
        assert_eq!(yaml.metadata().unwrap()["a"], 1);

        let para = Node::new("paragraph", Span::default()).with_field("data", json!({"a": 1}));
        assert!(para.metadata().is_none());
    }

    #[test]
    fn line_count_of_reversed_span_does_not_underflow() {
        let reversed = Span {
            start: Position { line: 5, column: 1 },
            end: Position { line: 2, column: 1 },
            start_offset: 40,
            end_offset: 10,
        };
        assert_eq!(reversed.line_count(), 1);
    }
}
