//! Path grammar: dot-separated identifiers, bracket index/key subscripts.
//!
//! `items[0]`, `items[0].name`, `items["a.b"]` are all valid. Out-of-bounds
//! indices, missing keys, and type mismatches are handled by the caller
//! (navigation just returns `None`) — this module only turns a raw string
//! into a sequence of [`Segment`]s, or rejects it as malformed.

use crate::error::TemplateError;
use serde_json::Value;

/// A single step of a resolved path: either an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a dotted/bracketed path into its segments.
///
/// The first segment is conventionally the scope name (`env`, `input`,
/// `resource`); callers split it off.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
    let chars: Vec<char> = input.chars().collect();
    let n = chars.len();
    let invalid = || TemplateError::InvalidPath(input.to_string());

    if n == 0 {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    let mut i = 0;
    let mut expect_segment_start = true;

    while i < n {
        match chars[i] {
            '[' => {
                i += 1;
                let bracket_start = i;
                while i < n && chars[i] != ']' {
                    i += 1;
                }
                if i >= n {
                    return Err(invalid());
                }
                let content: String = chars[bracket_start..i].iter().collect();
                i += 1;
                segments.push(parse_bracket_content(&content, input)?);
                expect_segment_start = false;
            }
            '.' => {
                if expect_segment_start {
                    return Err(invalid());
                }
                i += 1;
                expect_segment_start = true;
            }
            _ => {
                let start = i;
                while i < n && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                if i == start {
                    return Err(invalid());
                }
                segments.push(Segment::Key(chars[start..i].iter().collect()));
                expect_segment_start = false;
            }
        }
    }

    if expect_segment_start || segments.is_empty() {
        return Err(invalid());
    }

    Ok(segments)
}

fn parse_bracket_content(content: &str, full: &str) -> Result<Segment, TemplateError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(TemplateError::InvalidPath(full.to_string()));
    }

    if let Ok(idx) = trimmed.parse::<usize>() {
        return Ok(Segment::Index(idx));
    }

    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Ok(Segment::Key(trimmed[1..trimmed.len() - 1].to_string()));
        }
    }

    // Bare, unquoted bracket key (e.g. `items[name]`) — treat as a string key.
    Ok(Segment::Key(trimmed.to_string()))
}

/// Navigate `value` by `segments`. Out-of-bounds indices, missing keys, and
/// indexing into the wrong shape (e.g. a string) are uniformly `None`.
pub fn navigate<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_dotted_path() {
        assert_eq!(
            parse("a.b.c").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Key("c".into())
            ]
        );
    }

    #[test]
    fn parses_bracket_index() {
        assert_eq!(
            parse("items[0].name").unwrap(),
            vec![
                Segment::Key("items".into()),
                Segment::Index(0),
                Segment::Key("name".into())
            ]
        );
    }

    #[test]
    fn parses_quoted_bracket_key_with_dots() {
        assert_eq!(
            parse(r#"items["a.b"]"#).unwrap(),
            vec![Segment::Key("items".into()), Segment::Key("a.b".into())]
        );
    }

    #[test]
    fn rejects_trailing_dot() {
        assert!(parse("a.").is_err());
    }

    #[test]
    fn rejects_unbalanced_bracket() {
        assert!(parse("a[0").is_err());
    }

    #[test]
    fn navigate_out_of_bounds_is_missing() {
        let v = serde_json::json!({"items": [1, 2]});
        assert!(navigate(&v, &parse("items[5]").unwrap()).is_none());
    }

    #[test]
    fn navigate_type_mismatch_is_missing() {
        let v = serde_json::json!({"name": "bob"});
        assert!(navigate(&v, &parse("name[0]").unwrap()).is_none());
    }
}
