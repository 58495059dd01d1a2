use regex::Regex;
use std::sync::LazyLock;

static COMMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ms)(?P<markup><!--.*?-->)|(?P<block>/\*.*?\*/)|(?:^|[^:"'])(?P<line>//[^\n]*)|(?:^|[ \t])(?P<shell>#[^\n]*)"#,
    )
    .expect("comment pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
    Shell,
    Markup,
}

/// Byte range of a comment inside a verbatim text blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSpan {
    pub start: usize,
    pub end: usize,
    pub kind: CommentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub is_comment: bool,
}

/// Comment spans in `text`, ordered and non-overlapping.
pub fn find_comment_spans(text: &str) -> Vec<CommentSpan> {
    let mut spans = Vec::new();
    for captures in COMMENT_PATTERN.captures_iter(text) {
        let matched = [
            ("markup", CommentKind::Markup),
            ("block", CommentKind::Block),
            ("line", CommentKind::Line),
            ("shell", CommentKind::Shell),
        ]
        .into_iter()
        .find_map(|(name, kind)| captures.name(name).map(|found| (found, kind)));
        if let Some((found, kind)) = matched {
            spans.push(CommentSpan {
                start: found.start(),
                end: found.end(),
                kind,
            });
        }
    }
    spans
}

/// Cuts `text` at the span boundaries. The segments cover the whole input in
/// order, so concatenating them yields `text` again.
pub fn project_segments<'a>(text: &'a str, spans: &[CommentSpan]) -> Vec<Segment<'a>> {
    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor || span.end > text.len() || span.start >= span.end {
            continue;
        }
        if span.start > cursor {
            segments.push(Segment {
                text: &text[cursor..span.start],
                is_comment: false,
            });
        }
        segments.push(Segment {
            text: &text[span.start..span.end],
            is_comment: true,
        });
        cursor = span.end;
    }
    if cursor < text.len() {
        segments.push(Segment {
            text: &text[cursor..],
            is_comment: false,
        });
    }
    segments
}
