use crate::reports::Warning;
use gateway_controller_core::{InputResource, ResourceId};
use gateway_controller_k8s_api::{
    self as k8s, labels::InvalidExpression, route::Delegation, GatewaySelection, ResourceExt,
};

/// Resolves the route tables targeted by a delegate action.
///
/// Every failure is a warning: tables may be applied after the resources that
/// delegate to them.
pub(crate) fn select_route_tables<'s>(
    tables: &'s [k8s::RouteTable],
    delegation: Option<&Delegation>,
    owner: &ResourceId,
) -> Result<Vec<&'s k8s::RouteTable>, Warning> {
    match delegation {
        Some(Delegation::Ref(reference)) => {
            let namespace = reference.namespace_or(&owner.namespace);
            let table = find(tables, namespace, &reference.name).ok_or_else(|| {
                Warning::RouteTableMissing(format!("{namespace}.{}", reference.name))
            })?;
            Ok(vec![table])
        }

        Some(Delegation::Selector(selector)) => {
            if selector.is_ambiguous() {
                return Err(Warning::AmbiguousRouteTableSelector);
            }
            let selected = select(tables, selector, &owner.namespace)
                .map_err(Warning::InvalidRouteTableSelector)?;
            if selected.is_empty() {
                return Err(Warning::NoMatchingRouteTables);
            }
            Ok(selected)
        }

        None => Err(Warning::MissingRefAndSelector {
            kind: owner.kind,
            resource: owner.clone(),
        }),
    }
}

/// Resolves the matchable gateways a hybrid gateway delegates to.
///
/// A reference to a missing gateway selects nothing.
pub(crate) fn select_gateways<'s, T: InputResource>(
    gateways: &'s [T],
    selection: Option<&GatewaySelection>,
    owner_namespace: &str,
) -> Result<Vec<&'s T>, InvalidExpression> {
    match selection {
        Some(GatewaySelection::Ref(reference)) => {
            let namespace = reference.namespace_or(owner_namespace);
            let found = find(gateways, namespace, &reference.name);
            if found.is_none() {
                tracing::debug!(%namespace, name = %reference.name, kind = %T::KIND, "Delegated gateway not found");
            }
            Ok(found.into_iter().collect())
        }
        Some(GatewaySelection::Selector(selector)) => select(gateways, selector, owner_namespace),
        None => Ok(Vec::new()),
    }
}

fn select<'s, T: InputResource>(
    candidates: &'s [T],
    selector: &k8s::Selector,
    owner_namespace: &str,
) -> Result<Vec<&'s T>, InvalidExpression> {
    let mut selected = Vec::new();
    for candidate in candidates {
        let namespace = candidate.namespace().unwrap_or_default();
        if !selector.matches_namespace(owner_namespace, &namespace) {
            continue;
        }
        if selector.matches_labels(candidate.labels())? {
            selected.push(candidate);
        }
    }
    Ok(selected)
}

fn find<'s, T: InputResource>(resources: &'s [T], namespace: &str, name: &str) -> Option<&'s T> {
    resources.iter().find(|r| {
        r.meta().namespace.as_deref() == Some(namespace) && r.meta().name.as_deref() == Some(name)
    })
}
