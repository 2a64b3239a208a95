//! Routing table of the development server's reverse proxy.

pub const DEMO_BACKEND: &str = "http://localhost:16000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    pub prefix: String,
    pub target: String,
    pub websocket: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub url: String,
    pub websocket: bool,
}

/// Rules are tried in order; the first whose prefix matches wins.
#[derive(Debug, Clone, Default)]
pub struct ProxyTable {
    rules: Vec<ProxyRule>,
}

impl ProxyRule {
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }
}

impl ProxyTable {
    /// The demo's table: the websocket path first so the plain prefix does not shadow it.
    pub fn demo(target: &str) -> Self {
        ProxyTable::default()
            .rule("/postgraphile/demo/ws", target, true)
            .rule("/postgraphile/demo", target, false)
    }

    pub fn rule(mut self, prefix: &str, target: &str, websocket: bool) -> Self {
        self.rules.push(ProxyRule {
            prefix: prefix.to_owned(),
            target: target.trim_end_matches('/').to_owned(),
            websocket,
        });
        self
    }

    /// Where `path` is forwarded, with the matched prefix stripped. `None` when no rule applies.
    pub fn route(&self, path: &str) -> Option<ProxyRoute> {
        let rule = self.rules.iter().find(|rule| rule.matches(path))?;
        let rest = &path[rule.prefix.len()..];
        let url = if rest.starts_with('/') {
            format!("{}{}", rule.target, rest)
        } else {
            format!("{}/{}", rule.target, rest)
        };

        Some(ProxyRoute {
            url,
            websocket: rule.websocket,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/postgraphile/demo/ws", "http://localhost:16000/", true)]
    #[case("/postgraphile/demo/graphql", "http://localhost:16000/graphql", false)]
    #[case("/postgraphile/demo", "http://localhost:16000/", false)]
    #[case("/postgraphile/demo?x=1", "http://localhost:16000/?x=1", false)]
    fn routes_demo_paths(#[case] path: &str, #[case] url: &str, #[case] websocket: bool) {
        let route = ProxyTable::demo(DEMO_BACKEND).route(path).unwrap();
        assert_eq!(route, ProxyRoute { url: url.to_owned(), websocket });
    }

    #[rstest]
    #[case("/other")]
    #[case("/postgraphile/demonstration")]
    fn leaves_other_paths(#[case] path: &str) {
        assert_eq!(ProxyTable::demo(DEMO_BACKEND).route(path), None);
    }
}
