//! 空白标记识别
//!
//! 所有文本类格式共用：把一行文本切成 `Text` / `Blank` 片段。

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BlankKind, Segment, TextRun};

static RE_BLANK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)_{3,}|\[(?:answer|blank)\]|\{\{\s*answer\s*\}\}|<answer>")
        .expect("valid blank marker regex")
});
static RE_ANSWER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\banswer\s*:\s*$").expect("valid answer label regex"));
static RE_CODE_STUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)^\s*(?:
            (?:pass\s*)?(?:\#|//)\s*(?:todo|your\ code\ here|implement\ me)\b.*
          | raise\s+NotImplementedError(?:\(.*\))?
          | todo!\(.*\);?
          | unimplemented!\(.*\);?
          | throw\s+new\s+Error\(\s*["']not\ implemented["']\s*\);?
        )\s*$"#,
    )
    .expect("valid code stub regex")
});

/// 把一行文本切分为片段
///
/// 识别下划线、占位符，以及行尾没有内容的 `Answer:` 标签。
/// CRLF 文本行尾的 `\r` 单独保留在最后，空白总是落在它前面。
pub fn split_blanks(line: &str) -> TextRun {
    if let Some(body) = line.strip_suffix('\r') {
        let mut run = split_blanks(body);
        match run.segments.last_mut() {
            Some(Segment::Text(t)) => t.push('\r'),
            _ => run.segments.push(Segment::text("\r")),
        }
        return run;
    }

    let mut segments = Vec::new();
    let mut last = 0;

    for m in RE_BLANK_MARKER.find_iter(line) {
        if m.start() > last {
            segments.push(Segment::text(&line[last..m.start()]));
        }
        let kind = if m.as_str().starts_with('_') {
            BlankKind::Underline
        } else {
            BlankKind::Placeholder
        };
        segments.push(Segment::blank(m.as_str(), kind));
        last = m.end();
    }

    let tail = &line[last..];
    if RE_ANSWER_LABEL.is_match(tail) && !segments.iter().any(|s| s.is_blank()) {
        segments.push(Segment::text(tail));
        segments.push(Segment::blank("", BlankKind::AnswerLabel));
    } else if !tail.is_empty() || segments.is_empty() {
        segments.push(Segment::text(tail));
    }

    TextRun::new(segments)
}

/// 代码行是否只是一个未完成标记
pub fn is_code_stub(line: &str) -> bool {
    RE_CODE_STUB.is_match(line)
}
