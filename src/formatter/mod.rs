//! Query tokenizer used for syntax highlighting.
//!
//! A query is a flat list of clauses joined by `&&`, each clause optionally
//! in `key=value` form. There is no nesting and no escaping. The formatter
//! never changes the query, it only derives display segments from it, and it
//! is cheap enough to rerun on every keystroke.
//!
//! All offsets are measured in chars so CJK values slice correctly.

pub const CONJUNCTION: &str = "&&";
pub const ASSIGN: char = '=';

const CONJUNCTION_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Key,
    Operator,
    Value,
    Conjunction,
}

impl Role {
    /// Visual class: `&&` is styled like `=`.
    pub fn class(self) -> &'static str {
        match self {
            Role::Key => "key",
            Role::Operator | Role::Conjunction => "operator",
            Role::Value => "value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub role: Role,
    pub text: String,
    /// Char index into `text` where the cursor sits.
    pub caret: Option<usize>,
}

impl Segment {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Segment {
            role,
            text: text.into(),
            caret: None,
        }
    }
}

/// One `&&`-delimited piece of a query, kept untrimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub raw: String,
    /// Raw key and value around the first `=`.
    pub pair: Option<(String, String)>,
}

impl Clause {
    pub fn parse(raw: &str) -> Clause {
        Clause {
            raw: raw.to_string(),
            pair: raw
                .split_once(ASSIGN)
                .map(|(k, v)| (k.to_string(), v.to_string())),
        }
    }

    fn segments(&self) -> Vec<Segment> {
        match &self.pair {
            Some((k, v)) => vec![
                Segment::new(Role::Key, k.trim()),
                Segment::new(Role::Operator, ASSIGN.to_string()),
                Segment::new(Role::Value, v.trim()),
            ],
            None => vec![Segment::new(Role::Value, self.raw.trim())],
        }
    }

    /// Segment offset (relative to this clause's first segment) and caret for
    /// a char offset inside the raw clause.
    fn locate(&self, local: usize) -> (usize, usize) {
        match &self.pair {
            Some((k, v)) => {
                let key_len = k.chars().count();
                if local <= key_len {
                    (0, trimmed_caret(k, local))
                } else {
                    (2, trimmed_caret(v, local - key_len - 1))
                }
            }
            None => (0, trimmed_caret(&self.raw, local)),
        }
    }
}

/// Maps a position in `raw` onto `raw.trim()`, clamping into range.
fn trimmed_caret(raw: &str, pos: usize) -> usize {
    let lead = raw.chars().take_while(|c| c.is_whitespace()).count();
    let trimmed_len = raw.trim().chars().count();
    pos.saturating_sub(lead).min(trimmed_len)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedQuery {
    pub clauses: Vec<Clause>,
    pub segments: Vec<Segment>,
}

impl FormattedQuery {
    /// Index of the segment holding the caret, with the caret position.
    pub fn caret(&self) -> Option<(usize, usize)> {
        self.segments
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.caret.map(|c| (i, c)))
    }
}

/// Literal split on `&&`. Empty clauses are kept.
pub fn split_clauses(value: &str) -> Vec<&str> {
    value.split(CONJUNCTION).collect()
}

fn has_structure(value: &str) -> bool {
    value.contains(CONJUNCTION) || value.contains(ASSIGN)
}

/// Tokenizes `value` into display segments.
///
/// Returns `None` for empty input and for input with neither `&&` nor `=`;
/// callers render those as plain text. `cursor` is a char offset into the
/// untrimmed input and is clamped to its length.
pub fn format_query(value: &str, cursor: Option<usize>) -> Option<FormattedQuery> {
    if value.is_empty() || !has_structure(value) {
        return None;
    }

    let clauses: Vec<Clause> = split_clauses(value).into_iter().map(Clause::parse).collect();

    let mut segments = Vec::new();
    let mut starts = Vec::with_capacity(clauses.len());
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            segments.push(Segment::new(Role::Conjunction, CONJUNCTION));
        }
        starts.push(segments.len());
        segments.extend(clause.segments());
    }

    if let Some(cursor) = cursor {
        let cursor = cursor.min(value.chars().count());
        if let Some((index, caret)) = locate_cursor(&clauses, &starts, cursor) {
            segments[index].caret = Some(caret);
        }
    }

    Some(FormattedQuery { clauses, segments })
}

fn locate_cursor(clauses: &[Clause], starts: &[usize], cursor: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (i, clause) in clauses.iter().enumerate() {
        let end = start + clause.raw.chars().count();
        if cursor <= end {
            let (offset, caret) = clause.locate(cursor - start);
            return Some((starts[i] + offset, caret));
        }
        if cursor < end + CONJUNCTION_LEN {
            // inside `&&`; the conjunction sits just before the next clause
            return Some((starts[i + 1] - 1, cursor - end));
        }
        start = end + CONJUNCTION_LEN;
    }
    None
}
