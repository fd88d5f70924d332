use crate::hash::stable_hash;
use gateway_controller_k8s_api::{self as k8s, SslConfig};
use std::collections::HashMap;

/// Virtual services that can share a filter chain because their SSL configs
/// differ at most by SNI domains.
#[derive(Debug)]
pub(crate) struct SslGroup<'s> {
    pub(crate) config: SslConfig,
    pub(crate) virtual_services: Vec<&'s k8s::VirtualService>,
}

/// Groups virtual services by SSL config, ignoring SNI domains.
///
/// Each group's SNI domains are the union of its members' domains, unless a
/// member declares none, in which case the group matches every server name.
/// Groups are returned in the order their first member appears.
pub(crate) fn group_by_ssl_config<'s>(
    virtual_services: impl IntoIterator<Item = (&'s k8s::VirtualService, SslConfig)>,
) -> Vec<SslGroup<'s>> {
    let mut groups = Vec::<SslGroup<'s>>::new();
    let mut by_hash = HashMap::<u64, usize>::new();
    // Groups with a member that accepts any server name.
    let mut wildcard = Vec::<bool>::new();

    for (vs, config) in virtual_services {
        let key = stable_hash(&config.without_sni_domains());
        let Some(&idx) = by_hash.get(&key) else {
            by_hash.insert(key, groups.len());
            wildcard.push(config.sni_domains.is_empty());
            groups.push(SslGroup {
                config,
                virtual_services: vec![vs],
            });
            continue;
        };

        let group = &mut groups[idx];
        group.virtual_services.push(vs);
        if config.sni_domains.is_empty() {
            wildcard[idx] = true;
            group.config.sni_domains.clear();
        } else if !wildcard[idx] {
            for domain in config.sni_domains {
                if !group.config.sni_domains.contains(&domain) {
                    group.config.sni_domains.push(domain);
                }
            }
        }
    }

    groups
}
