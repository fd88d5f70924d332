use crate::{labels, matchers::Matcher, options::RouteOptions, resource_ref::ResourceRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A route as authored on a `VirtualService` or `RouteTable`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<Matcher>,
    /// Children inherit this route's header, method and query matchers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inheritable_matchers: Option<bool>,
    /// Children inherit this route's path and case sensitivity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inheritable_path_matchers: Option<bool>,
    #[serde(flatten)]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RouteOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_config_refs: Option<DelegateOptionsRefs>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    RouteAction(RouteAction),
    RedirectAction(RedirectAction),
    DirectResponseAction(DirectResponseAction),
    DelegateAction(DelegateAction),
    GraphqlApiRef(ResourceRef),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteAction {
    #[serde(flatten)]
    pub destination: Option<Destination>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Destination {
    Single(SingleDestination),
    Multi(MultiDestination),
    UpstreamGroup(ResourceRef),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SingleDestination {
    pub upstream: ResourceRef,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subset: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MultiDestination {
    pub destinations: Vec<WeightedDestination>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeightedDestination {
    pub destination: SingleDestination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedirectAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_rewrite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_redirect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_redirect: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectResponseAction {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Hands matching requests to the routes of one or more `RouteTable`s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelegateAction {
    #[serde(flatten)]
    pub delegation: Option<Delegation>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Delegation {
    Ref(ResourceRef),
    Selector(labels::Selector),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelegateOptionsRefs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegate_options: Vec<ResourceRef>,
}

// === impl Route ===

impl Route {
    pub fn with_name(mut self, name: impl ToString) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_matchers(mut self, matchers: impl IntoIterator<Item = Matcher>) -> Self {
        self.matchers = matchers.into_iter().collect();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn delegate_action(&self) -> Option<&DelegateAction> {
        match self.action {
            Some(Action::DelegateAction(ref d)) => Some(d),
            _ => None,
        }
    }
}

// === impl Action ===

impl Action {
    pub fn upstream(upstream: ResourceRef) -> Self {
        Self::RouteAction(RouteAction {
            destination: Some(Destination::Single(SingleDestination {
                upstream,
                subset: BTreeMap::new(),
            })),
        })
    }

    pub fn direct_response(status: u16) -> Self {
        Self::DirectResponseAction(DirectResponseAction { status, body: None })
    }

    pub fn delegate_ref(table: ResourceRef) -> Self {
        Self::DelegateAction(DelegateAction {
            delegation: Some(Delegation::Ref(table)),
        })
    }

    pub fn delegate_selector(selector: labels::Selector) -> Self {
        Self::DelegateAction(DelegateAction {
            delegation: Some(Delegation::Selector(selector)),
        })
    }
}

// === impl Destination ===

impl Destination {
    /// Fills in the namespace of every upstream reference that omits one.
    pub fn default_namespaces(&mut self, owner: &str) {
        match self {
            Self::Single(single) => single.upstream.default_namespace(owner),
            Self::Multi(multi) => {
                for weighted in &mut multi.destinations {
                    weighted.destination.upstream.default_namespace(owner);
                }
            }
            Self::UpstreamGroup(group) => group.default_namespace(owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_delegate_routes() {
        let route: Route = serde_json::from_str(
            r#"{
                "matchers": [{"prefix": "/api"}],
                "delegateAction": {"ref": {"name": "rt1"}}
            }"#,
        )
        .expect("route must parse");
        assert_eq!(
            route,
            Route::default()
                .with_matchers([Matcher::prefix("/api")])
                .with_action(Action::delegate_ref(ResourceRef {
                    name: "rt1".to_string(),
                    namespace: None,
                }))
        );
    }

    #[test]
    fn parses_selector_delegation() {
        let route: Route = serde_json::from_str(
            r#"{
                "delegateAction": {
                    "selector": {"namespaces": ["*"], "labels": {"team": "a"}}
                }
            }"#,
        )
        .expect("route must parse");
        let selector = labels::Selector::from_iter(Some(("team", "a"))).in_namespaces(["*"]);
        assert_eq!(route.action, Some(Action::delegate_selector(selector)));
    }

    #[test]
    fn defaults_upstream_namespaces() {
        let mut dest = Destination::Multi(MultiDestination {
            destinations: vec![
                WeightedDestination {
                    destination: SingleDestination {
                        upstream: ResourceRef {
                            name: "a".to_string(),
                            namespace: None,
                        },
                        subset: BTreeMap::new(),
                    },
                    weight: Some(1),
                },
                WeightedDestination {
                    destination: SingleDestination {
                        upstream: ResourceRef::new("other", "b"),
                        subset: BTreeMap::new(),
                    },
                    weight: Some(1),
                },
            ],
        });
        dest.default_namespaces("ns");
        let Destination::Multi(multi) = dest else {
            panic!("destination kind must not change");
        };
        assert_eq!(
            multi.destinations[0].destination.upstream,
            ResourceRef::new("ns", "a")
        );
        assert_eq!(
            multi.destinations[1].destination.upstream,
            ResourceRef::new("other", "b")
        );
    }
}
