//! Mapping validator errors back to source spans.
//!
//! A validator error names the failing value by its instance path, e.g.
//! `["children", "2", "children", "0"]`. [`resolve`] walks that path through
//! the tree it was produced from and records the span reached at each hop.
//! The walk is total: an index past the end, a missing field or a step into
//! a scalar ends it early and the partial trail is returned as is.
//!
//! Span attribution per hop:
//! - selecting a named field records the span of the node being indexed,
//!   since field values carry no span of their own;
//! - indexing into `children` records the span of the selected child;
//! - steps inside field data (e.g. parsed header values) record the span of
//!   the node that owns the field.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::types::{FieldRef, Node, Span};
use crate::validator::AbstractError;

/// One resolved hop of an instance path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathPart {
    pub segment: String,
    pub span: Span,
}

/// A validator error together with its resolution trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedError {
    pub document: PathBuf,
    pub error: AbstractError,
    pub trail: Vec<PathPart>,
}

impl LocatedError {
    /// Resolve `error` against the tree it was reported for.
    pub fn new(document: &Path, tree: &Node, error: AbstractError) -> Self {
        let trail = resolve(tree, &error.instance_path);
        Self {
            document: document.to_path_buf(),
            error,
            trail,
        }
    }

    /// The deepest resolved location, if any hop resolved.
    ///
    /// Consumers should fall back to a document-level location on `None`.
    pub fn jump_target(&self) -> Option<&Span> {
        self.trail.last().map(|part| &part.span)
    }

    /// Returns true if every segment of the instance path resolved.
    pub fn is_fully_resolved(&self) -> bool {
        self.trail.len() == self.error.instance_path.len()
    }
}

#[derive(Clone, Copy)]
enum Cursor<'a> {
    Node(&'a Node),
    Children(&'a [Node]),
    Value { value: &'a Value, owner: &'a Node },
    Kind,
}

/// Walk `instance_path` through `tree`, returning one [`PathPart`] per
/// resolved segment. Never panics; stops at the first unresolvable segment.
pub fn resolve<S: AsRef<str>>(tree: &Node, instance_path: &[S]) -> Vec<PathPart> {
    let mut trail = Vec::with_capacity(instance_path.len());
    let mut cursor = Cursor::Node(tree);

    for segment in instance_path {
        let segment = segment.as_ref();
        let step = match cursor {
            Cursor::Node(node) => node.field(segment).map(|field| {
                let next = match field {
                    FieldRef::Kind(_) => Cursor::Kind,
                    FieldRef::Children(children) => Cursor::Children(children),
                    FieldRef::Value(value) => Cursor::Value { value, owner: node },
                };
                (node.span, next)
            }),
            Cursor::Children(children) => parse_index(segment)
                .and_then(|index| children.get(index))
                .map(|child| (child.span, Cursor::Node(child))),
            Cursor::Value { value, owner } => {
                lookup(value, segment).map(|value| (owner.span, Cursor::Value { value, owner }))
            }
            Cursor::Kind => None,
        };

        let Some((span, next)) = step else {
            tracing::debug!(segment, resolved = trail.len(), "instance path only partially resolved");
            break;
        };
        trail.push(PathPart {
            segment: segment.to_string(),
            span,
        });
        cursor = next;
    }

    trail
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn lookup<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => parse_index(segment).and_then(|index| items.get(index)),
        Value::Object(map) => map.get(segment),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::types::Position;
    use serde_json::json;

    fn lines(start: usize, end: usize) -> Span {
        Span {
            start: Position { line: start, column: 1 },
            end: Position { line: end, column: 10 },
            start_offset: start * 100,
            end_offset: end * 100 + 9,
        }
    }

    /// root (1-10) -> [a (1), b (2-3), c (4-7) -> [d (5-6)]]
    fn sample_tree() -> Node {
        Node::new("root", lines(1, 10))
            .with_child(Node::new("heading", lines(1, 1)).with_field("depth", 1))
            .with_child(Node::new("paragraph", lines(2, 3)))
            .with_child(
                Node::new("list", lines(4, 7))
                    .with_field("ordered", false)
                    .with_child(Node::new("listItem", lines(5, 6))),
            )
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nested_child_resolves_to_its_span() {
        let tree = sample_tree();
        let trail = resolve(&tree, &path(&["children", "2", "children", "0"]));

        assert_eq!(trail.len(), 4);
        assert_eq!(trail[0].span, lines(1, 10));
        assert_eq!(trail[1].span, lines(4, 7));
        assert_eq!(trail[2].span, lines(4, 7));
        assert_eq!(trail.last().unwrap().span, lines(5, 6));
        assert_eq!(trail[3].segment, "0");
    }

    #[test]
    fn field_hop_records_owning_node_span() {
        let tree = sample_tree();
        let trail = resolve(&tree, &["children", "2", "ordered"]);
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[2].span, lines(4, 7));
    }

    #[test]
    fn index_past_end_stops() {
        let tree = sample_tree();
        let trail = resolve(&tree, &["children", "9", "type"]);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].segment, "children");
    }

    #[test]
    fn missing_field_yields_empty_trail() {
        let tree = sample_tree();
        assert!(resolve(&tree, &["nope"]).is_empty());
    }

    #[test]
    fn leaf_has_no_children_field() {
        let tree = sample_tree();
        let trail = resolve(&tree, &["children", "0", "children", "0"]);
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].span, lines(1, 1));
    }

    #[test]
    fn numeric_segment_on_node_stops() {
        let tree = sample_tree();
        assert!(resolve(&tree, &["0"]).is_empty());
    }

    #[test]
    fn non_index_segments_into_children_stop() {
        let tree = sample_tree();
        for bad in ["first", "-1", "+1", "", "1.0"] {
            assert_eq!(resolve(&tree, &["children", bad]).len(), 1, "segment {bad:?}");
        }
    }

    #[test]
    fn kind_is_terminal() {
        let tree = sample_tree();
        let trail = resolve(&tree, &["children", "1", "type", "length"]);
        assert_eq!(trail.len(), 3);
    }

    #[test]
    fn empty_path_empty_trail() {
        let tree = sample_tree();
        assert!(resolve::<&str>(&tree, &[]).is_empty());
    }

    #[test]
    fn header_data_resolves_to_header_span() {
        let doc = parse("---\ntags:\n  - a\n  - b\n---\n\nBody\n");
        let header_span = doc.root.children[0].span;

        let trail = resolve(&doc.root, &["children", "0", "data", "tags", "1"]);
        assert_eq!(trail.len(), 5);
        assert_eq!(trail.last().unwrap().span, header_span);

        let trail = resolve(&doc.root, &["children", "0", "data", "tags", "7"]);
        assert_eq!(trail.len(), 4);
    }

    #[test]
    fn arbitrary_paths_never_panic() {
        let doc = parse("---\ntitle: x\nlist: [1, 2]\n---\n\n# H\n\n- a\n- b\n\n`code` and *em*\n");
        let segments = [
            "children", "0", "1", "2", "5", "99", "type", "data", "value", "title", "list", "depth",
            "", "-", "~", "children",
        ];
        for a in segments {
            for b in segments {
                for c in segments {
                    for d in segments {
                        let instance_path = [a, b, c, d];
                        let trail = resolve(&doc.root, &instance_path);
                        assert!(trail.len() <= instance_path.len());
                    }
                }
            }
        }
    }

    #[test]
    fn located_error_jump_target() {
        let tree = sample_tree();
        let error = AbstractError {
            instance_path: path(&["children", "2", "children", "0"]),
            pointer: "/children/2/children/0".into(),
            schema_path: "/properties/children/items/2".into(),
            keyword: "const".into(),
            instance: json!({}),
            message: "bad".into(),
        };
        let located = LocatedError::new(Path::new("note.md"), &tree, error);
        assert_eq!(located.jump_target(), Some(&lines(5, 6)));
        assert!(located.is_fully_resolved());
        assert_eq!(located.document, PathBuf::from("note.md"));
    }

    #[test]
    fn unresolved_error_has_no_jump_target() {
        let tree = sample_tree();
        let error = AbstractError {
            instance_path: path(&["missing"]),
            pointer: "/missing".into(),
            schema_path: "/required".into(),
            keyword: "required".into(),
            instance: json!(null),
            message: "bad".into(),
        };
        let located = LocatedError::new(Path::new("note.md"), &tree, error);
        assert_eq!(located.jump_target(), None);
        assert!(!located.is_fully_resolved());
    }
}
