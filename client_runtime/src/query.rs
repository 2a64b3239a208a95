use std::collections::HashMap;

/// Splits a query string into its parameters.
///
/// Values are kept raw (no percent-decoding). When a key repeats, the last value wins. A pair
/// without `=` maps to an empty value, empty pairs are skipped, and anything after a second `=`
/// in a pair is dropped.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut queries = HashMap::new();

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let mut parts = pair.split('=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        queries.insert(key.to_owned(), value.to_owned());
    }

    queries
}

/// Parameters of a `location.search` string, with or without its leading `?`.
pub fn url_queries(search: &str) -> HashMap<String, String> {
    parse_query(search.strip_prefix('?').unwrap_or(search))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[rstest]
    #[case("a=1&b=2", &[("a", "1"), ("b", "2")])]
    #[case("", &[])]
    #[case("code=abc%20def", &[("code", "abc%20def")])]
    #[case("a=1&a=2", &[("a", "2")])]
    #[case("flag", &[("flag", "")])]
    #[case("a=1&&b=2", &[("a", "1"), ("b", "2")])]
    #[case("a=b=c", &[("a", "b")])]
    fn parses(#[case] raw: &str, #[case] expected: &[(&str, &str)]) {
        assert_eq!(parse_query(raw), map(expected));
    }

    #[test]
    fn strips_question_mark_from_search() {
        assert_eq!(url_queries("?code=x&state=y"), map(&[("code", "x"), ("state", "y")]));
        assert!(url_queries("?").is_empty());
        assert!(url_queries("").is_empty());
    }
}
