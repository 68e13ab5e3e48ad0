//! Minimal reader for `.properties` descriptor resources.

use std::collections::HashMap;

/// Parses `key=value` / `key: value` / `key value` lines.
///
/// Supports `#` and `!` comments, backslash line continuations and the
/// usual escapes (`\t`, `\n`, `\r`, `\f`, `\uXXXX`). Later keys win.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        properties.insert(unescape(key), unescape(value));
    }

    properties
}

/// Splits a comma-separated list value, trimming items and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn ends_with_continuation(line: &str) -> bool {
    let backslashes = line.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                return (&line[..idx], line[idx + 1..].trim_start());
            }
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..idx], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_and_comments() {
        let text = "\
# comment
! also a comment
module.name=alpha
module.export.classPackages : a.b, a.c
module.export.resources   /META-INF/x.txt

";
        let props = parse_properties(text);
        assert_eq!(props.len(), 3);
        assert_eq!(props["module.name"], "alpha");
        assert_eq!(props["module.export.classPackages"], "a.b, a.c");
        assert_eq!(props["module.export.resources"], "/META-INF/x.txt");
    }

    #[test]
    fn test_line_continuation() {
        let text = "module.export.classPackages=a.b,\\\n    a.c,\\\n    a.d\n";
        let props = parse_properties(text);
        assert_eq!(props["module.export.classPackages"], "a.b,a.c,a.d");
    }

    #[test]
    fn test_escapes() {
        let props = parse_properties("key\\=with\\:colon=value\\u0041\n");
        assert_eq!(props["key=with:colon"], "valueA");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a.b ,, a.c ,"), vec!["a.b", "a.c"]);
        assert!(split_list("").is_empty());
    }
}
