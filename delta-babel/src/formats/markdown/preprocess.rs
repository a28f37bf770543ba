//! Source rewrites applied before comrak sees the text.
//!
//!     * `\(x\)` becomes `$x$`; a line holding only `\[x\]` becomes `$$x$$`, and lines
//!       holding only `\[` or `\]` become `$$`. A delimiter whose backslash is itself
//!       escaped (`\\(`) is literal text, and code spans are left alone.
//!     * With display-math promotion on, a line holding only `$x$` becomes `$$x$$`.
//!     * A line holding only a `<br>` tag becomes [`BREAK_SENTINEL`], an HTML comment
//!       that comrak reads as a block of its own instead of inline text.
//!
//!     Fenced code blocks are copied through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Standalone `<br>` after preprocessing.
pub const BREAK_SENTINEL: &str = "<!--delta:br-->";

static DISPLAY_MATH_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\\\[(.+)\\\]\s*$").expect("valid display math regex"));
static DOLLAR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)\$([^$\s][^$]*)\$\s*$").expect("valid dollar line regex"));
static BREAK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s{0,3}<br\s*/?>\s*$").expect("valid break regex"));
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(`{3,}|~{3,})").expect("valid fence regex"));

/// Rewrite `source` line by line.
pub fn preprocess(source: &str, promote_display_math: bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut fence: Option<String> = None;

    for line in source.split_inclusive('\n') {
        let (text, ending) = match line.strip_suffix('\n') {
            Some(text) => (text, "\n"),
            None => (line, ""),
        };

        if let Some(open) = &fence {
            let closes = FENCE.captures(text).is_some_and(|caps| {
                let marker = &caps[1];
                marker.starts_with(&open[..1])
                    && marker.len() >= open.len()
                    && text.trim_end().ends_with(marker)
                    && text.trim().len() == marker.len()
            });
            if closes {
                fence = None;
            }
            out.push_str(line);
            continue;
        }
        if let Some(caps) = FENCE.captures(text) {
            fence = Some(caps[1].to_string());
            out.push_str(line);
            continue;
        }

        out.push_str(&rewrite_line(text, promote_display_math));
        out.push_str(ending);
    }

    out
}

fn rewrite_line(text: &str, promote_display_math: bool) -> String {
    if BREAK_LINE.is_match(text) {
        return BREAK_SENTINEL.to_string();
    }
    match text.trim() {
        r"\[" | r"\]" => return "$$".to_string(),
        _ => {}
    }
    if let Some(caps) = DISPLAY_MATH_LINE
        .captures(text)
        .filter(|caps| trailing_backslashes(&caps[2]) % 2 == 0)
    {
        return format!("{}$${}$$", &caps[1], &caps[2]);
    }
    let text = inline_math(text);
    if promote_display_math {
        if let Some(caps) = DOLLAR_LINE.captures(&text) {
            return format!("{}$${}$$", &caps[1], &caps[2]);
        }
    }
    text.into_owned()
}

/// `\(x\)` to `$x$` outside code spans.
fn inline_math(text: &str) -> Cow<'_, str> {
    if !text.contains(r"\(") {
        return Cow::Borrowed(text);
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                let run = run_length(bytes, i, b'`');
                i = closing_ticks(bytes, i + run, run).unwrap_or(i + run);
            }
            b'\\' => {
                let run = run_length(bytes, i, b'\\');
                let next = i + run;
                if run % 2 == 0 {
                    i = next;
                    continue;
                }
                match bytes.get(next) {
                    Some(b'(') => {
                        if let Some(close) = closing_paren(bytes, next + 1) {
                            out.push_str(&text[copied..next - 1]);
                            out.push('$');
                            out.push_str(&text[next + 1..close]);
                            out.push('$');
                            i = close + 2;
                            copied = i;
                            continue;
                        }
                        i = next;
                    }
                    Some(b'`') => i = next + 1,
                    _ => i = next,
                }
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

fn run_length(bytes: &[u8], start: usize, byte: u8) -> usize {
    bytes[start..].iter().take_while(|b| **b == byte).count()
}

/// End of the backtick run of length `run` that closes a code span.
fn closing_ticks(bytes: &[u8], from: usize, run: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'`' {
            let len = run_length(bytes, j, b'`');
            if len == run {
                return Some(j + len);
            }
            j += len;
        } else {
            j += 1;
        }
    }
    None
}

/// Index of the backslash of the first unescaped `\)` after a non-empty body.
fn closing_paren(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'\\' {
            let run = run_length(bytes, j, b'\\');
            let close = j + run - 1;
            if run % 2 == 1 && bytes.get(j + run) == Some(&b')') && close > from {
                return Some(close);
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

fn trailing_backslashes(text: &str) -> usize {
    text.bytes().rev().take_while(|b| *b == b'\\').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latex_delimiters() {
        assert_eq!(preprocess(r"a \(x^2\) b", false), "a $x^2$ b");
        assert_eq!(preprocess(r"\[ \sum x \]", false), r"$$ \sum x $$");
        assert_eq!(preprocess("\\[\nx\n\\]\n", false), "$$\nx\n$$\n");
    }

    #[test]
    fn test_escaped_delimiters_stay_text() {
        assert_eq!(preprocess(r"\\(x\\) and \\\[y\\\]", false), r"\\(x\\) and \\\[y\\\]");
        assert_eq!(preprocess(r"\\\(x\)", false), r"\\$x$");
        assert_eq!(preprocess(r"\[a\\]", false), r"\[a\\]");
        assert_eq!(preprocess(r"\(\) \(y\)", false), r"$\) \(y$");
    }

    #[test]
    fn test_code_spans_keep_latex() {
        assert_eq!(preprocess(r"`\(x\)` and \(y\)", false), r"`\(x\)` and $y$");
        assert_eq!(preprocess(r"``a ` \(x\)`` \`\(z\)", false), r"``a ` \(x\)`` \`$z$");
        assert_eq!(preprocess(r"`open \(x\)", false), r"`open $x$");
    }

    #[test]
    fn test_promotes_standalone_dollar_math() {
        assert_eq!(preprocess("$x$\n", true), "$$x$$\n");
        assert_eq!(preprocess("$x$\n", false), "$x$\n");
        assert_eq!(preprocess("$x$ and $y$\n", true), "$x$ and $y$\n");
        assert_eq!(preprocess("$$x$$\n", true), "$$x$$\n");
    }

    #[test]
    fn test_standalone_break() {
        assert_eq!(
            preprocess("a\n\n<br>\n\nb", true),
            format!("a\n\n{BREAK_SENTINEL}\n\nb")
        );
        assert_eq!(preprocess("a <br> b", true), "a <br> b");
    }

    #[test]
    fn test_fenced_code_is_untouched() {
        let source = "```\n$x$\n<br>\n```\n$y$\n";
        assert_eq!(preprocess(source, true), "```\n$x$\n<br>\n```\n$$y$$\n");
    }

    #[test]
    fn test_longer_fence_needs_longer_close() {
        let source = "````\n```\n$x$\n````\n";
        assert_eq!(preprocess(source, true), source);
    }
}
