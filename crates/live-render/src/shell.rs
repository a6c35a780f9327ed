//! Shell splicer.
//!
//! Holds the static document shell and splices the freshly rendered
//! content into its mount element on every cycle. The mount element is
//! located once, at construction, by a stable attribute/id pair; its inner
//! span is found with a depth-aware tag scan (nested containers of the
//! same tag are counted, self-closing forms are recognized) and both
//! boundaries are frozen as byte offsets into the shell. Rendered content
//! is spliced between the frozen boundaries, so nested container markup
//! inside it can never corrupt region detection.
//!
//! The `<title>` element is tracked the same way. A `data-suffix`
//! attribute on it records the constant portion of the title; a later
//! title that does not already carry the suffix gets it re-appended, which
//! tolerates servers that only send the variable portion after the first
//! message.

use std::ops::Range;

use thiserror::Error;
use tracing::trace;

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum ShellError {
    #[error("MOUNT_NOT_FOUND")]
    MountNotFound,
    #[error("MALFORMED_MOUNT")]
    MalformedMount,
}

// ── ShellDoc ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShellDoc {
    shell: String,
    mount_inner: Range<usize>,
    title_inner: Option<Range<usize>>,
    title_suffix: Option<String>,
    title: Option<String>,
}

impl ShellDoc {
    /// Builds a splicer around the element carrying `attr="id"`.
    pub fn new(shell: String, attr: &str, id: &str) -> Result<ShellDoc, ShellError> {
        let open_start = find_tag_with_attr(&shell, attr, id).ok_or(ShellError::MountNotFound)?;
        let (tag, inner_start) =
            parse_open_tag(&shell, open_start).ok_or(ShellError::MalformedMount)?;
        let inner_end =
            find_matching_close(&shell, &tag, inner_start).ok_or(ShellError::MalformedMount)?;
        let (title_inner, title_suffix) = locate_title(&shell);
        Ok(ShellDoc {
            shell,
            mount_inner: inner_start..inner_end,
            title_inner,
            title_suffix,
            title: None,
        })
    }

    /// Constant title suffix declared by the shell, if any.
    pub fn title_suffix(&self) -> Option<&str> {
        self.title_suffix.as_deref()
    }

    /// Current tracked title, after suffix normalization.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Records a new title, re-appending the known constant suffix when
    /// the incoming value does not already carry it.
    pub fn set_title(&mut self, title: &str) {
        let mut full = title.to_owned();
        if let Some(suffix) = &self.title_suffix {
            if !full.ends_with(suffix.as_str()) {
                full.push_str(suffix);
            }
        }
        self.title = Some(full);
    }

    /// The full document with `content` spliced into the mount region and
    /// the tracked title, if any, spliced into the title element.
    pub fn publish(&self, content: &str) -> String {
        let mut splices: Vec<(&Range<usize>, &str)> = vec![(&self.mount_inner, content)];
        if let (Some(range), Some(title)) = (&self.title_inner, &self.title) {
            splices.push((range, title));
        }
        splices.sort_by_key(|(range, _)| range.start);
        let mut out = String::with_capacity(self.shell.len() + content.len());
        let mut cursor = 0;
        for (range, text) in splices {
            out.push_str(&self.shell[cursor..range.start]);
            out.push_str(text);
            cursor = range.end;
        }
        out.push_str(&self.shell[cursor..]);
        out
    }
}

// ── Tag scanning ──────────────────────────────────────────────────────────

/// Byte offset of the `>` ending an open tag, skipping quoted attribute
/// values so a literal `>` inside a value cannot truncate the tag.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (at, ch) in tag.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '>' => return Some(at),
                _ => {}
            },
        }
    }
    None
}

/// Byte offset of the `<` opening the first tag that carries `attr="id"`.
fn find_tag_with_attr(shell: &str, attr: &str, id: &str) -> Option<usize> {
    let needle = format!("{attr}=\"{id}\"");
    let mut from = 0;
    while let Some(found) = shell[from..].find(&needle) {
        let at = from + found;
        if let Some(open) = shell[..at].rfind('<') {
            // Inside a tag only if no unquoted `>` closed it before the
            // match.
            if find_tag_end(&shell[open..at]).is_none() {
                return Some(open);
            }
        }
        from = at + needle.len();
    }
    None
}

/// Tag name and inner-content start for the open tag at `open_start`.
/// Self-closing mounts have no inner region and are rejected.
fn parse_open_tag(shell: &str, open_start: usize) -> Option<(String, usize)> {
    let rest = &shell[open_start + 1..];
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let tag = rest[..name_len].to_owned();
    let gt = find_tag_end(rest)?;
    if rest[..gt].ends_with('/') {
        trace!(%tag, "mount element is self-closing");
        return None;
    }
    Some((tag, open_start + 1 + gt + 1))
}

/// Byte offset of the `</tag>` matching the open tag whose content starts
/// at `from`, counting nested open/close pairs of the same tag.
fn find_matching_close(shell: &str, tag: &str, from: usize) -> Option<usize> {
    let open_token = format!("<{tag}");
    let close_token = format!("</{tag}");
    let mut depth: usize = 1;
    let mut at = from;
    while let Some(found) = shell[at..].find('<') {
        let start = at + found;
        let rest = &shell[start..];
        if rest.starts_with(&close_token)
            && closes_cleanly(&rest[close_token.len()..])
        {
            depth -= 1;
            if depth == 0 {
                return Some(start);
            }
            at = start + close_token.len();
        } else if rest.starts_with(&open_token)
            && opens_cleanly(&rest[open_token.len()..])
        {
            let gt = find_tag_end(rest)?;
            if !rest[..gt].ends_with('/') {
                depth += 1;
            }
            at = start + gt + 1;
        } else {
            at = start + 1;
        }
    }
    None
}

/// After `</tag` only whitespace then `>` may follow.
fn closes_cleanly(rest: &str) -> bool {
    rest.trim_start().starts_with('>')
}

/// After `<tag` a boundary character must follow, so `<div` does not match
/// `<division>`.
fn opens_cleanly(rest: &str) -> bool {
    rest.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
}

/// Inner span of the `<title>` element plus its `data-suffix` attribute.
fn locate_title(shell: &str) -> (Option<Range<usize>>, Option<String>) {
    let Some(open) = find_plain_tag(shell, "title") else {
        return (None, None);
    };
    let rest = &shell[open..];
    let Some(gt) = find_tag_end(rest) else {
        return (None, None);
    };
    let inner_start = open + gt + 1;
    let Some(close) = shell[inner_start..].find("</title") else {
        return (None, None);
    };
    let suffix = extract_attr(&rest[..gt], "data-suffix");
    (Some(inner_start..inner_start + close), suffix)
}

fn find_plain_tag(shell: &str, tag: &str) -> Option<usize> {
    let token = format!("<{tag}");
    let mut at = 0;
    while let Some(found) = shell[at..].find(&token) {
        let start = at + found;
        if opens_cleanly(&shell[start + token.len()..]) {
            return Some(start);
        }
        at = start + token.len();
    }
    None
}

fn extract_attr(open_tag: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=\"");
    let at = open_tag.find(&needle)? + needle.len();
    let end = open_tag[at..].find('"')?;
    Some(open_tag[at..at + end].to_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────
