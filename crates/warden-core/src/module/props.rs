/// Lenient parser for the `key=value` property files used throughout the
/// module ecosystem (`module.prop`, `webui.prop`, remote descriptors).
///
/// Lines with no `=`, an empty key, or a key starting with `#` are skipped.
/// The value keeps everything after the first `=`; both sides are trimmed.
/// CRLF line endings are tolerated.
pub fn parse_prop_lines(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || key.starts_with('#') {
            continue;
        }

        pairs.push((key.to_string(), value.to_string()));
    }

    pairs
}

/// Boolean semantics of property values: only a case-insensitive `true`
/// counts as true.
pub fn prop_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let pairs = parse_prop_lines("id=foo\nname=Foo Mod\nversionCode=5\n");
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "foo".to_string()),
                ("name".to_string(), "Foo Mod".to_string()),
                ("versionCode".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn skips_comments_and_malformed_lines() {
        let pairs = parse_prop_lines("# a comment\n#key=value\nno equals here\n=empty key\nid=ok\n");
        assert_eq!(pairs, vec![("id".to_string(), "ok".to_string())]);
    }

    #[test]
    fn splits_on_first_equals_only() {
        let pairs = parse_prop_lines("description=a=b=c\n");
        assert_eq!(
            pairs,
            vec![("description".to_string(), "a=b=c".to_string())]
        );
    }

    #[test]
    fn tolerates_crlf_and_whitespace() {
        let pairs = parse_prop_lines("name = Foo \r\n version=1.0\r\n");
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "Foo".to_string()),
                ("version".to_string(), "1.0".to_string()),
            ]
        );
    }

    #[test]
    fn bool_values_require_literal_true() {
        assert!(prop_bool("true"));
        assert!(prop_bool("TRUE"));
        assert!(!prop_bool("false"));
        assert!(!prop_bool("1"));
        assert!(!prop_bool("yes"));
    }
}
