use crate::{duration::K8sDuration, resource_ref::ResourceRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Downstream TLS settings for a gateway, virtual service or TCP host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslConfig {
    #[serde(flatten)]
    pub ssl_secrets: Option<SslSecrets>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sni_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verify_subject_alt_name: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SslParameters>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn_protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_way_tls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_tls_session_resumption: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_socket_connect_timeout: Option<K8sDuration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SslSecrets {
    SecretRef(ResourceRef),
    SslFiles(SslFiles),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslFiles {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_cert: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_ca: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cipher_suites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ecdh_curves: Vec<String>,
}

impl SslConfig {
    pub fn from_secret(secret: ResourceRef) -> Self {
        Self {
            ssl_secrets: Some(SslSecrets::SecretRef(secret)),
            ..Self::default()
        }
    }

    pub fn with_sni_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.sni_domains = domains.into_iter().map(|d| d.to_string()).collect();
        self
    }

    /// A copy without SNI domains, used to group configs that differ only by
    /// the hostnames they serve.
    pub fn without_sni_domains(&self) -> Self {
        Self {
            sni_domains: Vec::new(),
            ..self.clone()
        }
    }
}
