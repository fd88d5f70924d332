use gateway_controller_core::Route;
use gateway_controller_k8s_api::{Matcher, PathSpecifier};
use std::cmp::Ordering;

/// Orders routes so that more specific matchers come first.
///
/// Only each route's first matcher is considered. The sort is stable, so
/// routes that compare equal keep their relative order.
pub(crate) fn sort_routes_by_path(routes: &mut [Route]) {
    routes.sort_by(|a, b| compare(a.matchers.first(), b.matchers.first()));
}

fn compare(a: Option<&Matcher>, b: Option<&Matcher>) -> Ordering {
    let default = Matcher::default_prefix();
    let a = a.unwrap_or(&default);
    let b = b.unwrap_or(&default);

    // More methods first, then exact before regex before prefix, then the
    // greater path string first.
    b.methods
        .len()
        .cmp(&a.methods.len())
        .then_with(|| kind_priority(a).cmp(&kind_priority(b)))
        .then_with(|| path(b).cmp(path(a)))
}

fn kind_priority(matcher: &Matcher) -> u8 {
    match matcher.path_specifier {
        Some(PathSpecifier::Exact(_)) => 0,
        Some(PathSpecifier::Regex(_)) => 1,
        Some(PathSpecifier::Prefix(_)) | None => 2,
    }
}

fn path(matcher: &Matcher) -> &str {
    match matcher.path_specifier {
        Some(ref p) => p.as_str(),
        None => Matcher::DEFAULT_PREFIX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::Action;
    use gateway_controller_k8s_api as k8s;
    use pretty_assertions::assert_eq;

    fn route(matcher: Matcher) -> Route {
        Route {
            name: String::new(),
            matchers: vec![matcher],
            action: Action::DirectResponseAction(k8s::route::DirectResponseAction {
                status: 200,
                body: None,
            }),
            options: None,
            sources: vec![],
        }
    }

    fn paths(routes: &[Route]) -> Vec<String> {
        routes.iter().map(|r| r.matchers[0].to_string()).collect()
    }

    #[test]
    fn orders_by_specificity() {
        let mut routes = vec![
            route(Matcher::prefix("/")),
            route(Matcher::prefix("/foo")),
            route(Matcher::regex("/fo.*")),
            route(Matcher::exact("/foo/bar")),
            route(Matcher::prefix("/foo/bar")),
            route(Matcher::prefix("/bar").with_methods(["GET"])),
        ];
        sort_routes_by_path(&mut routes);
        assert_eq!(
            paths(&routes),
            vec![
                Matcher::prefix("/bar").with_methods(["GET"]).to_string(),
                Matcher::exact("/foo/bar").to_string(),
                Matcher::regex("/fo.*").to_string(),
                Matcher::prefix("/foo/bar").to_string(),
                Matcher::prefix("/foo").to_string(),
                Matcher::prefix("/").to_string(),
            ]
        );
    }

    #[test]
    fn stable_for_equal_matchers() {
        let mut routes = vec![route(Matcher::prefix("/a")), route(Matcher::prefix("/a"))];
        routes[0].name = "first".to_string();
        routes[1].name = "second".to_string();
        sort_routes_by_path(&mut routes);
        assert_eq!(routes[0].name, "first");
        assert_eq!(routes[1].name, "second");
    }
}
