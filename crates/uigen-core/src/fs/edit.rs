//! Text edits applied to file content before it is written back.

/// Replace the single occurrence of `old` with `new`.
///
/// Fails when `old` is empty, absent, or ambiguous.
pub fn replace_unique(content: &str, old: &str, new: &str) -> Result<String, String> {
    if old.is_empty() {
        return Err("text to replace is empty".to_string());
    }
    let mut matches = content.match_indices(old);
    let Some((offset, _)) = matches.next() else {
        return Err("text to replace was not found".to_string());
    };
    let extra = matches.count();
    if extra > 0 {
        return Err(format!(
            "text to replace occurs {} times; include more surrounding context",
            extra + 1
        ));
    }

    let mut out = String::with_capacity(content.len() - old.len() + new.len());
    out.push_str(&content[..offset]);
    out.push_str(new);
    out.push_str(&content[offset + old.len()..]);
    Ok(out)
}

/// Insert `text` as its own line(s) after line `line` (1-based); `0` inserts
/// at the start of the file.
pub fn insert_after_line(content: &str, line: usize, text: &str) -> Result<String, String> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    if line > lines.len() {
        return Err(format!(
            "line {} is past the end of the file ({} lines)",
            line,
            lines.len()
        ));
    }

    let mut out = String::with_capacity(content.len() + text.len() + 2);
    for existing in &lines[..line] {
        out.push_str(existing);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(text);
    let rest = &lines[line..];
    if !rest.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
    for existing in rest {
        out.push_str(existing);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_unique() {
        let src = "const a = 1;\nconst b = 2;\n";
        assert_eq!(
            replace_unique(src, "b = 2", "b = 3").unwrap(),
            "const a = 1;\nconst b = 3;\n"
        );
    }

    #[test]
    fn test_replace_missing_and_ambiguous() {
        let src = "x x";
        assert!(replace_unique(src, "y", "z")
            .unwrap_err()
            .contains("not found"));
        assert!(replace_unique(src, "x", "z")
            .unwrap_err()
            .contains("2 times"));
        assert!(replace_unique(src, "", "z").is_err());
    }

    #[test]
    fn test_insert_at_start() {
        assert_eq!(
            insert_after_line("b\n", 0, "a").unwrap(),
            "a\nb\n"
        );
    }

    #[test]
    fn test_insert_in_middle_and_end() {
        let src = "one\ntwo\nthree";
        assert_eq!(
            insert_after_line(src, 1, "1.5").unwrap(),
            "one\n1.5\ntwo\nthree"
        );
        assert_eq!(
            insert_after_line(src, 3, "four").unwrap(),
            "one\ntwo\nthree\nfour"
        );
    }

    #[test]
    fn test_insert_into_empty_file() {
        assert_eq!(insert_after_line("", 0, "hello").unwrap(), "hello");
    }

    #[test]
    fn test_insert_past_end() {
        assert!(insert_after_line("one\n", 2, "x").is_err());
    }
}
