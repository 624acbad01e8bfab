//! Comment scanning with position tracking.
//!
//! Two regions of a file carry documentation: the leading comment block (all
//! comment and blank lines before the first code) and trailing `--` comments on
//! the column lines of the first `CREATE TABLE`.

use tombstone_ddl::Span;

/// A normalized comment line. `text` is empty for blank lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    pub text: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column of the first character of `text`.
    pub column: usize,
}

impl CommentLine {
    fn new(text: &str, line: usize, column: usize) -> Self {
        Self {
            text: text.to_string(),
            line,
            column,
        }
    }

    fn blank(line: usize) -> Self {
        Self::new("", line, 1)
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// A block comment in the leading region that never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnterminatedComment {
    /// Position of the opening `/*`.
    pub line: usize,
    pub column: usize,
}

/// A trailing `--` comment on a column definition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnComment {
    /// Column name as written at the start of the line.
    pub column_name: String,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// Trim a comment fragment and return it with the offset of its first character.
fn trimmed_with_offset(fragment: &str, offset: usize) -> (&str, usize) {
    let lead = fragment.len() - fragment.trim_start().len();
    (fragment.trim(), offset + lead)
}

/// Find the end of a block comment body starting at `from`, tracking nesting.
///
/// Returns the byte index of the closing `*/` when `depth` reaches zero.
fn find_block_end(line: &str, from: usize, depth: &mut usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                *depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                *depth -= 1;
                if *depth == 0 {
                    return Some(i);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

/// Normalize one line of block comment body: trim and drop leading `*`s.
fn block_body(fragment: &str, offset: usize) -> (&str, usize) {
    let (text, offset) = trimmed_with_offset(fragment, offset);
    let stripped = text.trim_start_matches('*');
    trimmed_with_offset(stripped, offset + (text.len() - stripped.len()))
}

/// Collect the leading comment block.
///
/// Scanning stops at the first code on any line; comment text before that code
/// on the same line still belongs to the block.
pub fn leading_comments(source: &str) -> Result<Vec<CommentLine>, UnterminatedComment> {
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut opened = UnterminatedComment { line: 1, column: 1 };

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let raw = raw.trim_start_matches('\u{feff}');
        let mut pos = 0usize;
        let mut emitted = false;

        loop {
            if depth > 0 {
                match find_block_end(raw, pos, &mut depth) {
                    Some(close) => {
                        let (text, col) = block_body(&raw[pos..close], pos);
                        lines.push(CommentLine::new(text, line_no, col + 1));
                        emitted = true;
                        pos = close + 2;
                        continue;
                    }
                    None => {
                        let (text, col) = block_body(&raw[pos..], pos);
                        lines.push(CommentLine::new(text, line_no, col + 1));
                        break;
                    }
                }
            }

            let rest = &raw[pos..];
            let lead = rest.len() - rest.trim_start().len();
            let rest = rest.trim_start();
            let start = pos + lead;

            if rest.is_empty() {
                if !emitted {
                    lines.push(CommentLine::blank(line_no));
                }
                break;
            }

            if let Some(body) = rest.strip_prefix("--") {
                let (text, col) = trimmed_with_offset(body, start + 2);
                lines.push(CommentLine::new(text, line_no, col + 1));
                break;
            }

            if rest.starts_with("/*") {
                depth = 1;
                opened = UnterminatedComment {
                    line: line_no,
                    column: start + 1,
                };
                pos = start + 2;
                continue;
            }

            // Code: the block ends here.
            return Ok(lines);
        }
    }

    if depth > 0 {
        return Err(opened);
    }
    Ok(lines)
}

/// Find the byte index of a `--` that starts a trailing comment.
///
/// Dash pairs inside `'...'` strings (with `''` escapes) and `[...]`
/// identifiers are skipped.
pub fn trailing_comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut in_bracket = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if c == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
        } else if in_bracket {
            if c == b']' {
                in_bracket = false;
            }
        } else {
            match c {
                b'\'' => in_string = true,
                b'[' => in_bracket = true,
                b'-' if bytes.get(i + 1) == Some(&b'-') => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Words that begin a table-level element rather than a column.
const ELEMENT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "FOREIGN",
    "UNIQUE",
    "CHECK",
    "INDEX",
    "PERIOD",
];

/// The identifier at the start of a code fragment: `[bracketed]` or bare.
fn leading_identifier(code: &str) -> Option<&str> {
    let code = code.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '(');
    if let Some(rest) = code.strip_prefix('[') {
        let end = rest.find(']')?;
        return Some(&rest[..end]);
    }
    if let Some(rest) = code.strip_prefix('"') {
        let end = rest.find('"')?;
        return Some(&rest[..end]);
    }
    let end = code
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '@' || c == '#' || c == '$'))
        .unwrap_or(code.len());
    let ident = &code[..end];
    if ident.is_empty() || ELEMENT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(ident)) {
        None
    } else {
        Some(ident)
    }
}

/// Collect trailing `--` comments on the lines of a table body.
///
/// `body` is the span of the parenthesised column list. Lines holding only a
/// comment are not trailing comments and are ignored.
pub fn trailing_comments(source: &str, body: Span) -> Vec<ColumnComment> {
    let mut comments = Vec::new();
    let inner_start = body.start + 1;
    let inner_end = body.end.saturating_sub(1);
    let mut line_start = 0usize;

    for (idx, raw) in source.split('\n').enumerate() {
        let line_end = line_start + raw.len();
        let seg_start = line_start.max(inner_start);
        let seg_end = line_end.min(inner_end);

        if seg_start < seg_end {
            if let Some(segment) = source.get(seg_start..seg_end) {
                let segment = segment.trim_end_matches('\r');
                if let Some(dash) = trailing_comment_start(segment) {
                    let code = &segment[..dash];
                    if let Some(column_name) = leading_identifier(code) {
                        let (text, col) = trimmed_with_offset(&segment[dash + 2..], 0);
                        let offset = seg_start - line_start + dash + 2 + col;
                        if !text.is_empty() {
                            comments.push(ColumnComment {
                                column_name: column_name.to_string(),
                                text: text.to_string(),
                                line: idx + 1,
                                column: offset + 1,
                            });
                        }
                    }
                }
            }
        }

        if line_start > inner_end {
            break;
        }
        line_start = line_end + 1;
    }

    comments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(lines: &[CommentLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_leading_line_comments() {
        let source = "-- @description Users\n--   of the system\n\nCREATE TABLE t (id INT)\n-- not leading";
        let lines = leading_comments(source).unwrap();
        assert_eq!(texts(&lines), vec!["@description Users", "of the system", ""]);
        assert_eq!((lines[0].line, lines[0].column), (1, 4));
        assert_eq!((lines[1].line, lines[1].column), (2, 6));
    }

    #[test]
    fn test_leading_block_comment() {
        let source = "/*\n * @description Orders.\n * @category sales\n */\nCREATE TABLE t (id INT)";
        let lines = leading_comments(source).unwrap();
        assert_eq!(
            texts(&lines),
            vec!["", "@description Orders.", "@category sales", ""]
        );
        assert_eq!((lines[1].line, lines[1].column), (2, 4));
    }

    #[test]
    fn test_block_lines_drop_every_leading_star() {
        let source = "/**\n ** @description Stars\n *** @category ref\n **/\nCREATE TABLE t (id INT)";
        let lines = leading_comments(source).unwrap();
        assert_eq!(
            texts(&lines),
            vec!["", "@description Stars", "@category ref", ""]
        );
        assert_eq!((lines[1].line, lines[1].column), (2, 5));
        assert_eq!((lines[2].line, lines[2].column), (3, 6));
    }

    #[test]
    fn test_single_line_block_then_code() {
        let lines = leading_comments("/** @category ref */ CREATE TABLE t (id INT)").unwrap();
        assert_eq!(texts(&lines), vec!["@category ref"]);
        assert_eq!(lines[0].column, 5);
    }

    #[test]
    fn test_block_stops_at_first_code_line() {
        let source = "-- one\nSET ANSI_NULLS ON\n-- @description too late\n";
        let lines = leading_comments(source).unwrap();
        assert_eq!(texts(&lines), vec!["one"]);
    }

    #[test]
    fn test_unterminated_block() {
        let err = leading_comments("-- ok\n  /* open\n never closed").unwrap_err();
        assert_eq!(err, UnterminatedComment { line: 2, column: 3 });
    }

    #[test]
    fn test_nested_block_in_leading_region() {
        let lines = leading_comments("/* a /* b */ c */\nGO").unwrap();
        assert_eq!(texts(&lines), vec!["a /* b */ c"]);
    }

    #[test]
    fn test_trailing_comment_start_skips_strings() {
        assert_eq!(trailing_comment_start("a INT DEFAULT '--x' -- real"), Some(20));
        assert_eq!(trailing_comment_start("a CHAR(2) DEFAULT 'it''s--' "), None);
        assert_eq!(trailing_comment_start("[odd--name] INT"), None);
    }

    #[test]
    fn test_trailing_comments_on_columns() {
        let source = "CREATE TABLE dbo.users (\n    [id] INT NOT NULL, -- surrogate key\n    email NVARCHAR(320) DEFAULT 'a--b', -- login\n    -- whole-line comment\n    CONSTRAINT pk PRIMARY KEY (id) -- not a column\n)";
        let open = source.find('(').unwrap();
        let close = source.rfind(')').unwrap();
        let comments = trailing_comments(source, Span::new(open, close + 1));

        let found: Vec<_> = comments
            .iter()
            .map(|c| (c.column_name.as_str(), c.text.as_str(), c.line))
            .collect();
        assert_eq!(
            found,
            vec![("id", "surrogate key", 2), ("email", "login", 3)]
        );
        assert_eq!(comments[0].column, 27);
    }
}
