use gateway_controller_k8s_api as k8s;
use std::collections::BTreeMap;

/// Route tables grouped by weight, iterated in ascending weight order.
///
/// Tables that share a weight keep the order in which they were indexed.
#[derive(Debug, Default)]
pub(crate) struct RouteTableIndex<'s>(BTreeMap<i32, Vec<&'s k8s::RouteTable>>);

// === impl RouteTableIndex ===

impl<'s> RouteTableIndex<'s> {
    pub(crate) fn new(tables: impl IntoIterator<Item = &'s k8s::RouteTable>) -> Self {
        let mut by_weight = BTreeMap::<_, Vec<_>>::new();
        for table in tables {
            by_weight.entry(table.spec.weight()).or_default().push(table);
        }
        Self(by_weight)
    }

    pub(crate) fn tiers(&self) -> impl Iterator<Item = (i32, &[&'s k8s::RouteTable])> + '_ {
        self.0.iter().map(|(weight, tables)| (*weight, tables.as_slice()))
    }
}
