//! Shallow merging of option bags.
//!
//! A merge only ever looks at the outermost fields of a structure: a field
//! that is set on the destination shadows the source's field entirely, even
//! when both hold nested structures.

use gateway_controller_k8s_api::{
    options::{RequestResponseTransformations, TransformationStages},
    HttpConnectionManagerSettings, HttpListenerOptions, ListenerOptions, RouteOptions, SslConfig,
    VirtualHostOptions,
};

/// Fills the unset fields of `self` from `src`.
pub trait Merge {
    fn merge_from(&mut self, src: &Self);
}

/// A structure field that may be left unset.
trait Field: Clone {
    fn is_unset(&self) -> bool;
}

impl<T: Clone> Field for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T: Clone> Field for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

fn fill<F: Field>(dst: &mut F, src: &F) {
    if dst.is_unset() && !src.is_unset() {
        *dst = src.clone();
    }
}

macro_rules! impl_merge {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl Merge for $ty {
            fn merge_from(&mut self, src: &Self) {
                $(fill(&mut self.$field, &src.$field);)+
            }
        }
    };
}

impl_merge!(RouteOptions {
    prefix_rewrite,
    timeout,
    retries,
    host_rewrite,
    auto_host_rewrite,
    host_rewrite_path_regex,
    regex_rewrite,
    header_manipulation,
    cors,
    staged_transformations,
    append_x_forwarded_host,
    idle_timeout,
});

impl_merge!(VirtualHostOptions {
    header_manipulation,
    cors,
    retries,
    staged_transformations,
    include_request_attempt_count,
    include_attempt_count_in_response,
});

impl_merge!(ListenerOptions {
    per_connection_buffer_limit_bytes,
    socket_options,
    connection_balance_config,
    access_log,
});

impl_merge!(HttpListenerOptions {
    http_connection_manager_settings,
    health_check,
    grpc_web,
    router,
});

impl_merge!(HttpConnectionManagerSettings {
    skip_xff_append,
    via,
    xff_num_trusted_hops,
    use_remote_address,
    generate_request_id,
    proxy_100_continue,
    stream_idle_timeout,
    idle_timeout,
    max_request_headers_kb,
    request_timeout,
    drain_timeout,
    server_name,
    accept_http_10,
    default_host_for_http_10,
    header_format,
    preserve_external_request_id,
    server_header_transformation,
});

impl_merge!(SslConfig {
    ssl_secrets,
    sni_domains,
    verify_subject_alt_name,
    parameters,
    alpn_protocols,
    one_way_tls,
    disable_tls_session_resumption,
    transport_socket_connect_timeout,
});

/// Merges two optional option bags; `dst` wins wherever it is set.
pub fn merge_options<T: Merge + Clone>(dst: Option<T>, src: Option<&T>) -> Option<T> {
    match (dst, src) {
        (None, src) => src.cloned(),
        (Some(dst), None) => Some(dst),
        (Some(mut dst), Some(src)) => {
            dst.merge_from(src);
            Some(dst)
        }
    }
}

/// Reconciles settings shared by a parent gateway and a delegated child.
///
/// The child's fields win unless the parent prevents overrides, in which case
/// the parent's set fields win.
pub fn reconcile<T: Merge + Clone>(
    parent: Option<&T>,
    child: Option<&T>,
    prevent_child_overrides: bool,
) -> Option<T> {
    if prevent_child_overrides {
        merge_options(parent.cloned(), child)
    } else {
        merge_options(child.cloned(), parent)
    }
}

/// Appends the parent's transformations after the child's own when the child
/// asks to inherit them.
pub(crate) fn inherit_transformations(
    child: &mut Option<RouteOptions>,
    parent: Option<&TransformationStages>,
) {
    let Some(stages) = child
        .as_mut()
        .and_then(|opts| opts.staged_transformations.as_mut())
    else {
        return;
    };
    if stages.inherit_transformation != Some(true) {
        return;
    }
    let Some(parent) = parent else {
        return;
    };
    append_transformations(&mut stages.regular, parent.regular.as_ref());
    append_transformations(&mut stages.early, parent.early.as_ref());
}

fn append_transformations(
    child: &mut Option<RequestResponseTransformations>,
    parent: Option<&RequestResponseTransformations>,
) {
    let Some(parent) = parent else {
        return;
    };
    match child {
        None => *child = Some(parent.clone()),
        Some(child) => {
            child
                .request_transforms
                .extend(parent.request_transforms.iter().cloned());
            child
                .response_transforms
                .extend(parent.response_transforms.iter().cloned());
        }
    }
}
