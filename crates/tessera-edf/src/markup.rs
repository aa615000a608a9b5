//! Scanner for nested symbol markup inside text values.
//!
//! Text such as `hello bold{world} color:#f00{red tint{x}}` is split into plain
//! text runs and symbol blocks. A block opens with `name{` or `name:arg{` and
//! closes with `}`; blocks nest. `\{`, `\}` and `\\` escape literal braces and
//! backslashes. The scanner reports events through a [`MarkupHandler`]; the
//! concatenation of all text events is the input with markup stripped.

/// Errors reported by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    /// `{` not preceded by a symbol name.
    #[error("block at byte {0} has no symbol name")]
    AnonymousBlock(usize),
    /// `}` without an open block.
    #[error("unbalanced '}}' at byte {0}")]
    UnbalancedClose(usize),
    /// Input ended inside one or more blocks.
    #[error("unclosed block '{0}'")]
    UnclosedBlock(String),
    /// Input ended right after a backslash.
    #[error("dangling escape at end of input")]
    DanglingEscape,
}

/// Receives scan events in document order.
pub trait MarkupHandler {
    fn text(&mut self, text: &str);
    fn start(&mut self, name: &str, arg: Option<&str>);
    fn end(&mut self, name: &str);
}

/// Owned form of a scan event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Text(String),
    Start { name: String, arg: Option<String> },
    End { name: String },
}

impl MarkupHandler for Vec<MarkupEvent> {
    fn text(&mut self, text: &str) {
        self.push(MarkupEvent::Text(text.to_owned()));
    }

    fn start(&mut self, name: &str, arg: Option<&str>) {
        self.push(MarkupEvent::Start {
            name: name.to_owned(),
            arg: arg.map(str::to_owned),
        });
    }

    fn end(&mut self, name: &str) {
        self.push(MarkupEvent::End {
            name: name.to_owned(),
        });
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split the trailing `name` or `name:arg` off a pending text run.
fn take_symbol(buf: &mut String) -> Option<(String, Option<String>)> {
    let arg_start = buf
        .char_indices()
        .rev()
        .take_while(|(_, c)| !c.is_whitespace() && *c != ':')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(buf.len());
    let has_arg = arg_start > 0 && buf[..arg_start].ends_with(':');

    let name_end = if has_arg { arg_start - 1 } else { arg_start };
    let (name_end, arg) = if has_arg {
        (name_end, Some(buf[arg_start..].to_owned()))
    } else {
        // Without an argument the whole trailing run must be the name.
        (buf.len(), None)
    };

    let name_start = buf[..name_end]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_symbol_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(name_end);
    if name_start == name_end {
        return None;
    }
    let name = buf[name_start..name_end].to_owned();
    buf.truncate(name_start);
    Some((name, arg))
}

fn flush(buf: &mut String, handler: &mut dyn MarkupHandler) {
    if !buf.is_empty() {
        handler.text(buf);
        buf.clear();
    }
}

/// Scan `input`, reporting events to `handler`.
pub fn scan(input: &str, handler: &mut dyn MarkupHandler) -> Result<(), MarkupError> {
    let mut stack: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut chars = input.char_indices();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => buf.push(escaped),
                None => return Err(MarkupError::DanglingEscape),
            },
            '{' => {
                let (name, arg) = take_symbol(&mut buf).ok_or(MarkupError::AnonymousBlock(pos))?;
                flush(&mut buf, handler);
                handler.start(&name, arg.as_deref());
                stack.push(name);
            }
            '}' => {
                let name = stack.pop().ok_or(MarkupError::UnbalancedClose(pos))?;
                flush(&mut buf, handler);
                handler.end(&name);
            }
            _ => buf.push(c),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::UnclosedBlock(open));
    }
    flush(&mut buf, handler);
    Ok(())
}

/// Scan into owned events.
pub fn events(input: &str) -> Result<Vec<MarkupEvent>, MarkupError> {
    let mut out = Vec::new();
    scan(input, &mut out)?;
    Ok(out)
}

/// The input with all markup removed.
pub fn strip(input: &str) -> Result<String, MarkupError> {
    Ok(events(input)?
        .into_iter()
        .filter_map(|e| match e {
            MarkupEvent::Text(t) => Some(t),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str, arg: Option<&str>) -> MarkupEvent {
        MarkupEvent::Start {
            name: name.to_owned(),
            arg: arg.map(str::to_owned),
        }
    }

    fn end(name: &str) -> MarkupEvent {
        MarkupEvent::End {
            name: name.to_owned(),
        }
    }

    fn text(t: &str) -> MarkupEvent {
        MarkupEvent::Text(t.to_owned())
    }

    #[test]
    fn nested_blocks_fire_in_matching_order() {
        let ev = events("a{b:xxx{c:yyy}zzz}").unwrap();
        assert_eq!(
            ev,
            vec![
                start("a", None),
                start("b", Some("xxx")),
                text("c:yyy"),
                end("b"),
                text("zzz"),
                end("a"),
            ]
        );
        assert_eq!(strip("a{b:xxx{c:yyy}zzz}").unwrap(), "c:yyyzzz");
    }

    #[test]
    fn leading_text_is_kept_apart_from_symbol() {
        let ev = events("hello bold{world}!").unwrap();
        assert_eq!(
            ev,
            vec![text("hello "), start("bold", None), text("world"), end("bold"), text("!")]
        );
    }

    #[test]
    fn escapes_produce_literal_braces() {
        assert_eq!(strip(r"set \{x\} to \\").unwrap(), r"set {x} to \");
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert_eq!(events("x}"), Err(MarkupError::UnbalancedClose(1)));
        assert_eq!(events("a{open"), Err(MarkupError::UnclosedBlock("a".to_owned())));
        assert_eq!(events(" {x}"), Err(MarkupError::AnonymousBlock(1)));
        assert_eq!(events("oops\\"), Err(MarkupError::DanglingEscape));
    }

    #[test]
    fn plain_text_is_single_event() {
        assert_eq!(events("just text").unwrap(), vec![text("just text")]);
        assert!(events("").unwrap().is_empty());
    }
}
