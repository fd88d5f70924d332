//! Detection of routes that can never be reached because an earlier route in
//! the same virtual host already matches every request they would.
//!
//! The checks assume the routes are in their final order. They are
//! conservative: when a pair of conditions cannot be compared precisely, the
//! later route is considered reachable.

use crate::{
    hash::stable_hash,
    reports::{ResourceReports, Warning},
};
use gateway_controller_core::{ResourceId, VirtualHost};
use gateway_controller_k8s_api::{HeaderMatcher, Matcher};
use regex::Regex;
use std::{collections::HashSet, sync::OnceLock};

const METHOD_HEADER: &str = ":method";

/// Reports duplicate matchers, then prefixes and finally regexes that hide
/// later routes.
pub(crate) fn validate(vs: &ResourceId, vh: &VirtualHost, reports: &mut ResourceReports) {
    let matchers = || vh.routes.iter().flat_map(|r| r.matchers.iter());

    let mut seen = HashSet::new();
    for matcher in matchers() {
        if !seen.insert(stable_hash(matcher)) {
            reports.add_warning(
                vs,
                Warning::ConflictingMatcher {
                    virtual_host: vh.name.clone(),
                    matcher: matcher.clone(),
                },
            );
        }
    }

    let mut prefixes = Vec::<&Matcher>::new();
    for matcher in matchers() {
        for earlier in &prefixes {
            let prefix = earlier.prefix_str().unwrap_or_default();
            if prefix_short_circuits(matcher, earlier) && non_path_short_circuits(matcher, earlier)
            {
                reports.add_warning(
                    vs,
                    Warning::UnorderedPrefix {
                        virtual_host: vh.name.clone(),
                        prefix: prefix.to_string(),
                        matcher: matcher.clone(),
                    },
                );
            }
        }
        if matcher.prefix_str().is_some_and(|p| !p.is_empty()) {
            prefixes.push(matcher);
        }
    }

    let mut regexes = Vec::<&Matcher>::new();
    for matcher in matchers() {
        if matcher.regex_str().is_some_and(|r| !r.is_empty()) {
            regexes.push(matcher);
            continue;
        }
        for earlier in &regexes {
            if regex_short_circuits(matcher, earlier) && non_path_short_circuits(matcher, earlier) {
                reports.add_warning(
                    vs,
                    Warning::UnorderedRegex {
                        virtual_host: vh.name.clone(),
                        regex: earlier.regex_str().unwrap_or_default().to_string(),
                        matcher: matcher.clone(),
                    },
                );
            }
        }
    }
}

fn prefix_short_circuits(later: &Matcher, earlier: &Matcher) -> bool {
    let prefix = earlier.prefix_str().unwrap_or_default();
    later.path_str().starts_with(prefix) && later.case_sensitive == earlier.case_sensitive
}

fn regex_short_circuits(later: &Matcher, earlier: &Matcher) -> bool {
    let Ok(re) = Regex::new(earlier.regex_str().unwrap_or_default()) else {
        // Invalid regexes are reported separately.
        return false;
    };
    re.is_match(later.path_str()) && later.case_sensitive != Some(true)
}

/// Whether the earlier matcher's header, method and query conditions accept
/// every request the later matcher's do. Methods are compared as a `:method`
/// regex header.
fn non_path_short_circuits(later: &Matcher, earlier: &Matcher) -> bool {
    let later_headers = with_method_header(later);
    let earlier_headers = with_method_header(earlier);
    query_parameters_short_circuit(later, earlier)
        && headers_short_circuit(&later_headers, &earlier_headers)
}

fn with_method_header(matcher: &Matcher) -> Vec<HeaderMatcher> {
    let mut headers = matcher.headers.clone();
    if !matcher.methods.is_empty() {
        headers.push(HeaderMatcher::regex(
            METHOD_HEADER,
            format!("({})", matcher.methods.join("|")),
        ));
    }
    headers
}

fn query_parameters_short_circuit(later: &Matcher, earlier: &Matcher) -> bool {
    for early in &earlier.query_parameters {
        let mut overlapping = false;
        for late in later.query_parameters.iter().filter(|q| q.name == early.name) {
            overlapping = true;
            match (early.regex, late.regex) {
                (true, false) => {
                    let Ok(re) = Regex::new(&early.value) else {
                        return false;
                    };
                    if !re.is_match(&late.value) {
                        return false;
                    }
                }
                (false, false) => {
                    if !early.value.is_empty() && early.value != late.value {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        if !overlapping {
            return false;
        }
    }
    true
}

fn headers_short_circuit(later: &[HeaderMatcher], earlier: &[HeaderMatcher]) -> bool {
    for early in earlier {
        let mut overlapping = false;
        for late in later.iter().filter(|h| h.name == early.name) {
            overlapping = true;
            match (early.regex, late.regex) {
                (true, false) => {
                    let Ok(re) = Regex::new(&early.value) else {
                        return false;
                    };
                    if re.is_match(&late.value) == early.invert_match {
                        return false;
                    }
                }
                (false, false) => {
                    let matches = early.value.is_empty() || early.value == late.value;
                    if matches == early.invert_match {
                        return false;
                    }
                }
                _ => {
                    if !alternation_partially_short_circuited(late, early) {
                        return false;
                    }
                }
            }
        }
        if !overlapping {
            return false;
        }
    }
    true
}

/// Handles a later header written as a simple alternation such as
/// `(GET|POST)`: it is hidden when any alternative is accepted by the earlier
/// header.
fn alternation_partially_short_circuited(later: &HeaderMatcher, earlier: &HeaderMatcher) -> bool {
    static ALTERNATION: OnceLock<Option<Regex>> = OnceLock::new();
    let alternation = ALTERNATION.get_or_init(|| Regex::new(r"^\(\w+([|\[\w]+)+\)$").ok());
    let Some(alternation) = alternation else {
        return false;
    };
    if !alternation.is_match(&later.value) {
        return false;
    }

    let inner = &later.value[1..later.value.len() - 1];
    let earlier_re = if earlier.regex {
        match Regex::new(&earlier.value) {
            Ok(re) => Some(re),
            Err(_) => return false,
        }
    } else {
        None
    };

    inner.split('|').any(|alternative| {
        let found = match earlier_re {
            Some(ref re) => re.is_match(alternative),
            None => alternative == earlier.value,
        };
        found != earlier.invert_match
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{Action, Kind, Route};
    use gateway_controller_k8s_api::{route::DirectResponseAction, QueryParameterMatcher};
    use pretty_assertions::assert_eq;

    fn vs() -> ResourceId {
        ResourceId::new(Kind::VirtualService, "ns", "vs")
    }

    fn vhost(matchers: Vec<Matcher>) -> VirtualHost {
        VirtualHost {
            name: "ns.vs".to_string(),
            routes: matchers
                .into_iter()
                .map(|m| Route {
                    name: String::new(),
                    matchers: vec![m],
                    action: Action::DirectResponseAction(DirectResponseAction {
                        status: 200,
                        body: None,
                    }),
                    options: None,
                    sources: vec![],
                })
                .collect(),
            ..VirtualHost::default()
        }
    }

    fn warnings(matchers: Vec<Matcher>) -> Vec<Warning> {
        let mut reports = ResourceReports::default();
        validate(&vs(), &vhost(matchers), &mut reports);
        reports
            .get(&vs())
            .map(|r| r.warnings.clone())
            .unwrap_or_default()
    }

    #[test]
    fn duplicate_matchers() {
        assert_eq!(
            warnings(vec![Matcher::exact("/a"), Matcher::exact("/a")]),
            vec![Warning::ConflictingMatcher {
                virtual_host: "ns.vs".to_string(),
                matcher: Matcher::exact("/a"),
            }]
        );
    }

    #[test]
    fn earlier_prefix_hides_later_routes() {
        assert_eq!(
            warnings(vec![Matcher::prefix("/foo"), Matcher::exact("/foo/bar")]),
            vec![Warning::UnorderedPrefix {
                virtual_host: "ns.vs".to_string(),
                prefix: "/foo".to_string(),
                matcher: Matcher::exact("/foo/bar"),
            }]
        );
    }

    #[test]
    fn ordered_prefixes_are_fine() {
        assert_eq!(
            warnings(vec![Matcher::exact("/foo/bar"), Matcher::prefix("/foo")]),
            vec![]
        );
    }

    #[test]
    fn more_specific_later_headers_are_reachable() {
        assert_eq!(
            warnings(vec![
                Matcher::prefix("/foo").with_headers([HeaderMatcher::exact("x", "1")]),
                Matcher::prefix("/foo/bar").with_headers([HeaderMatcher::exact("x", "2")]),
            ]),
            vec![]
        );
        // The earlier route has no conditions the later one lacks.
        assert_eq!(
            warnings(vec![
                Matcher::prefix("/foo"),
                Matcher::prefix("/foo/bar").with_headers([HeaderMatcher::exact("x", "2")]),
            ])
            .len(),
            1
        );
    }

    #[test]
    fn earlier_regex_hides_later_routes() {
        assert_eq!(
            warnings(vec![Matcher::regex("/fo+"), Matcher::exact("/foo")]),
            vec![Warning::UnorderedRegex {
                virtual_host: "ns.vs".to_string(),
                regex: "/fo+".to_string(),
                matcher: Matcher::exact("/foo"),
            }]
        );
        let case_sensitive = Matcher {
            case_sensitive: Some(true),
            ..Matcher::exact("/foo")
        };
        assert_eq!(
            warnings(vec![Matcher::regex("/fo+"), case_sensitive]),
            vec![]
        );
    }

    #[test]
    fn inverted_method_header_hides_alternations() {
        let earlier = Matcher::prefix("/foo")
            .with_headers([HeaderMatcher::exact(METHOD_HEADER, "GET").inverted()]);
        let later = Matcher::prefix("/foo").with_methods(["GET", "POST"]);
        assert_eq!(
            warnings(vec![earlier.clone(), later.clone()]),
            vec![Warning::UnorderedPrefix {
                virtual_host: "ns.vs".to_string(),
                prefix: "/foo".to_string(),
                matcher: later,
            }]
        );

        let get_only = Matcher::prefix("/foo").with_methods(["GET"]);
        assert_eq!(warnings(vec![earlier, get_only]), vec![]);
    }

    #[test]
    fn query_parameters() {
        let earlier = Matcher::prefix("/foo")
            .with_query_parameters([QueryParameterMatcher::regex("q", "a.*")]);
        let hidden = Matcher::prefix("/foo/bar")
            .with_query_parameters([QueryParameterMatcher::exact("q", "abc")]);
        let reachable = Matcher::prefix("/foo/baz")
            .with_query_parameters([QueryParameterMatcher::exact("q", "xyz")]);
        assert_eq!(
            warnings(vec![earlier, hidden.clone(), reachable]),
            vec![Warning::UnorderedPrefix {
                virtual_host: "ns.vs".to_string(),
                prefix: "/foo".to_string(),
                matcher: hidden,
            }]
        );
    }
}
