use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Space,
    Tab,
}

impl IndentStyle {
    fn unit(self) -> char {
        match self {
            IndentStyle::Space => ' ',
            IndentStyle::Tab => '\t',
        }
    }
}

/// Detected indentation. `style` is `None` exactly when `width` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indent {
    pub width: usize,
    pub style: Option<IndentStyle>,
}

impl Indent {
    pub const NONE: Indent = Indent {
        width: 0,
        style: None,
    };

    pub fn as_string(&self) -> String {
        match self.style {
            Some(style) => std::iter::repeat_n(style.unit(), self.width).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Formatting conventions of a manifest, captured once from its original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattingProfile {
    pub indent: Indent,
    pub line_ending: Option<LineEnding>,
    pub trailing_newline: bool,
}

impl FormattingProfile {
    pub fn detect(text: &str) -> Self {
        let line_ending = detect_line_ending(text);
        Self {
            indent: detect_indent(text),
            line_ending,
            trailing_newline: line_ending.is_some() && text.ends_with('\n'),
        }
    }

    /// Serializes `value` the way the original text was laid out.
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        let mut out = if self.indent.width == 0 {
            serde_json::to_string(value)?
        } else {
            let indent = self.indent.as_string();
            let mut buf = Vec::new();
            let formatter = PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer)?;
            // serde_json only ever emits valid UTF-8
            String::from_utf8_lossy(&buf).into_owned()
        };

        let ending = self.line_ending.unwrap_or(LineEnding::Lf);
        if ending == LineEnding::CrLf {
            out = out.replace('\n', ending.as_str());
        }
        if self.trailing_newline {
            out.push_str(ending.as_str());
        }
        Ok(out)
    }
}

/// Dominant line ending of `text`, `None` when it has no line breaks.
pub fn detect_line_ending(text: &str) -> Option<LineEnding> {
    let total = text.matches('\n').count();
    if total == 0 {
        return None;
    }
    let crlf = text.matches("\r\n").count();
    if crlf > total - crlf {
        Some(LineEnding::CrLf)
    } else {
        Some(LineEnding::Lf)
    }
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    occurrences: usize,
    weight: usize,
}

/// Infers the indentation unit of `text`.
///
/// Every non-empty line contributes the change of its leading indent relative
/// to the previous line. The most frequent absolute change wins; ties go to
/// the change that more lines directly followed after indenting, then to the
/// change seen first.
pub fn detect_indent(text: &str) -> Indent {
    let mut spaces = 0usize;
    let mut tabs = 0usize;
    let mut previous = 0usize;
    // insertion ordered so ties resolve deterministically
    let mut tallies: Vec<(usize, Tally)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut last_was_indent = false;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let depth = match line.as_bytes()[0] {
            b' ' => {
                spaces += 1;
                line.bytes().take_while(|b| *b == b' ').count()
            }
            b'\t' => {
                tabs += 1;
                line.bytes().take_while(|b| *b == b'\t').count()
            }
            _ => 0,
        };

        let diff = depth as isize - previous as isize;
        previous = depth;

        if diff != 0 {
            last_was_indent = diff > 0;
            let amount = diff.unsigned_abs();
            let index = match tallies.iter().position(|(key, _)| *key == amount) {
                Some(index) => {
                    tallies[index].1.occurrences += 1;
                    index
                }
                None => {
                    tallies.push((
                        amount,
                        Tally {
                            occurrences: 1,
                            weight: 0,
                        },
                    ));
                    tallies.len() - 1
                }
            };
            current = Some(index);
        } else if let Some(index) = current {
            if last_was_indent {
                tallies[index].1.weight += 1;
            }
        }
    }

    let mut width = 0;
    let mut best = Tally {
        occurrences: 0,
        weight: 0,
    };
    for (amount, tally) in &tallies {
        if tally.occurrences > best.occurrences
            || (tally.occurrences == best.occurrences && tally.weight > best.weight)
        {
            best = *tally;
            width = *amount;
        }
    }

    if width == 0 {
        return Indent::NONE;
    }

    let style = if spaces > tabs {
        IndentStyle::Space
    } else {
        IndentStyle::Tab
    };
    Indent {
        width,
        style: Some(style),
    }
}
