//! Markdown parsing into a positioned tree.
//!
//! Node kinds and field names follow mdast (`heading.depth`, `list.ordered`,
//! `code.lang`, `text.value`, ...) so schemas written against that shape work
//! unchanged. Spans come from pulldown-cmark's byte ranges, converted to
//! 1-indexed line/column positions.

use std::ops::Range;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::Value;

use crate::error::MetadataError;
use crate::types::{json_type_name, Document, Metadata, Node, Position, Span, METADATA_KIND};

/// Deepest nesting kept in the tree. Constructs opened below this depth are
/// flattened into their deepest kept ancestor, so instance building and
/// validation recurse a bounded number of levels.
pub const MAX_DEPTH: usize = 128;

/// Parse a document into its tree and header metadata.
///
/// Never fails: a header that does not parse leaves `metadata` absent and
/// the `yaml` node without a `data` field. A header is only recognized when
/// the document opens with it; a later `---` pair is ordinary markdown.
pub fn parse(text: &str) -> Document {
    let mut builder = TreeBuilder::new(text);

    let body_start = leading_header(text, &mut builder);
    let body = &text[body_start..];
    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
        builder.event(event, (range.start + body_start)..(range.end + body_start));
    }
    let root = builder.finish();

    let metadata = root
        .children
        .first()
        .and_then(Node::metadata)
        .cloned();

    Document { root, metadata }
}

/// Feed the opening header block, if any, and return where the body starts.
fn leading_header(text: &str, builder: &mut TreeBuilder<'_>) -> usize {
    let mut events =
        Parser::new_ext(text, options() | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS).into_offset_iter();
    let header_end = match events.next() {
        Some((event @ Event::Start(Tag::MetadataBlock(_)), range)) if range.start == 0 => {
            builder.event(event, range.clone());
            range.end
        }
        _ => return 0,
    };

    for (event, range) in events {
        let done = matches!(event, Event::End(TagEnd::MetadataBlock(_)));
        builder.event(event, range);
        if done {
            break;
        }
    }
    header_end.min(text.len())
}

/// Parse the raw text of a header block.
pub fn parse_metadata(raw: &str) -> Result<Metadata, MetadataError> {
    let value: Value = serde_yaml::from_str(raw).map_err(|source| MetadataError::Yaml { source })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MetadataError::NotAMapping {
            actual: json_type_name(&other),
        }),
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Maps byte offsets to line/column positions.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    fn position(&self, text: &str, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        Position {
            line,
            column: text[line_start..offset].chars().count() + 1,
        }
    }
}

struct Frame {
    node: Node,
    /// Field that collects raw text instead of child nodes.
    literal: Option<(&'static str, String)>,
}

struct TreeBuilder<'s> {
    text: &'s str,
    lines: LineIndex,
    stack: Vec<Frame>,
    /// Opened constructs past `MAX_DEPTH` whose end is still pending.
    flattened: usize,
}

impl<'s> TreeBuilder<'s> {
    fn new(text: &'s str) -> Self {
        let lines = LineIndex::new(text);
        let root_span = Span {
            start: Position::start(),
            end: lines.position(text, text.len()),
            start_offset: 0,
            end_offset: text.len(),
        };
        Self {
            text,
            lines,
            stack: vec![Frame {
                node: Node::new("root", root_span),
                literal: None,
            }],
            flattened: 0,
        }
    }

    /// Span for a parser range, excluding trailing line breaks.
    fn span(&self, range: Range<usize>) -> Span {
        let bytes = self.text.as_bytes();
        let start = range.start.min(self.text.len());
        let mut end = range.end.min(self.text.len());
        while end > start && matches!(bytes[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        Span {
            start: self.lines.position(self.text, start),
            end: self.lines.position(self.text, end),
            start_offset: start,
            end_offset: end,
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => self.open(tag, range),
            Event::End(_) => self.close(),
            Event::Text(text) => self.text(&text, range),
            Event::SoftBreak => self.text("\n", range),
            Event::Code(code) => {
                if !self.append_literal(&code) {
                    let node = Node::new("inlineCode", self.span(range)).with_field("value", code.as_ref());
                    self.attach(node);
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                if !self.append_literal(&html) {
                    let node = Node::new("html", self.span(range)).with_field("value", html.as_ref());
                    self.attach(node);
                }
            }
            Event::FootnoteReference(label) => {
                let node =
                    Node::new("footnoteReference", self.span(range)).with_field("label", label.as_ref());
                self.attach(node);
            }
            Event::HardBreak => {
                let node = Node::new("break", self.span(range));
                self.attach(node);
            }
            Event::Rule => {
                let node = Node::new("thematicBreak", self.span(range));
                self.attach(node);
            }
            Event::TaskListMarker(checked) => {
                if let Some(item) = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find(|frame| frame.node.kind == "listItem")
                {
                    item.node.fields.insert("checked".into(), Value::Bool(checked));
                }
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>, range: Range<usize>) {
        if self.flattened > 0 || self.stack.len() > MAX_DEPTH {
            if self.flattened == 0 {
                tracing::debug!(depth = self.stack.len(), "nesting too deep, flattening");
            }
            self.flattened += 1;
            return;
        }

        let span = self.span(range);
        let mut literal = None;
        let node = match tag {
            Tag::Paragraph => Node::new("paragraph", span),
            Tag::Heading { level, .. } => Node::new("heading", span).with_field("depth", heading_depth(level)),
            Tag::BlockQuote(_) => Node::new("blockquote", span),
            Tag::CodeBlock(kind) => {
                literal = Some(("value", String::new()));
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                Node::new("code", span).with_field("lang", lang)
            }
            Tag::HtmlBlock => {
                literal = Some(("value", String::new()));
                Node::new("html", span)
            }
            Tag::List(start) => {
                let node = Node::new("list", span).with_field("ordered", start.is_some());
                match start {
                    Some(n) => node.with_field("start", n),
                    None => node,
                }
            }
            Tag::Item => Node::new("listItem", span),
            Tag::FootnoteDefinition(label) => {
                Node::new("footnoteDefinition", span).with_field("label", label.as_ref())
            }
            Tag::Table(alignments) => {
                let align: Vec<Value> = alignments.iter().map(alignment_name).collect();
                Node::new("table", span).with_field("align", align)
            }
            Tag::TableHead | Tag::TableRow => Node::new("tableRow", span),
            Tag::TableCell => Node::new("tableCell", span),
            Tag::Emphasis => Node::new("emphasis", span),
            Tag::Strong => Node::new("strong", span),
            Tag::Strikethrough => Node::new("delete", span),
            Tag::Link { dest_url, title, .. } => Node::new("link", span)
                .with_field("url", dest_url.as_ref())
                .with_field("title", non_empty(&title)),
            Tag::Image { dest_url, title, .. } => {
                literal = Some(("alt", String::new()));
                Node::new("image", span)
                    .with_field("url", dest_url.as_ref())
                    .with_field("title", non_empty(&title))
            }
            Tag::MetadataBlock(_) => {
                literal = Some(("value", String::new()));
                Node::new(METADATA_KIND, span)
            }
            _ => Node::new("unknown", span),
        };
        self.stack.push(Frame { node, literal });
    }

    fn close(&mut self) {
        if self.flattened > 0 {
            self.flattened -= 1;
            return;
        }
        // The root frame is only popped by `finish`.
        if self.stack.len() < 2 {
            return;
        }
        let Some(Frame { mut node, literal }) = self.stack.pop() else {
            return;
        };

        if let Some((key, mut raw)) = literal {
            if raw.ends_with('\n') {
                raw.pop();
            }
            if node.kind == METADATA_KIND {
                match parse_metadata(&raw) {
                    Ok(map) => {
                        node.fields.insert("data".into(), Value::Object(map));
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "ignoring unparsable document header");
                    }
                }
            }
            node.fields.insert(key.into(), Value::String(raw));
        }

        self.attach(node);
    }

    /// Append to the innermost literal field, if one is collecting.
    fn append_literal(&mut self, text: &str) -> bool {
        match self.stack.last_mut().and_then(|frame| frame.literal.as_mut()) {
            Some((_, buffer)) => {
                buffer.push_str(text);
                true
            }
            None => false,
        }
    }

    fn text(&mut self, text: &str, range: Range<usize>) {
        if self.append_literal(text) {
            return;
        }
        let span = self.span(range);
        let Some(parent) = self.stack.last_mut() else {
            return;
        };

        // Adjacent runs and soft breaks form one text node.
        if let Some(last) = parent.node.children.last_mut().filter(|n| n.kind == "text") {
            if let Some(Value::String(value)) = last.fields.get_mut("value") {
                value.push_str(text);
            }
            if span.end_offset > last.span.end_offset {
                last.span.end = span.end;
                last.span.end_offset = span.end_offset;
            }
            return;
        }

        parent
            .node
            .children
            .push(Node::new("text", span).with_field("value", text));
    }

    fn attach(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.node.children.push(node);
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack
            .pop()
            .map(|frame| frame.node)
            .unwrap_or_else(|| Node::new("root", Span::default()))
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn alignment_name(alignment: &Alignment) -> Value {
    match alignment {
        Alignment::None => Value::Null,
        Alignment::Left => "left".into(),
        Alignment::Center => "center".into(),
        Alignment::Right => "right".into(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
