use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Prefix the configuration ID is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub configuration: String,

    #[serde(default = "default_true")]
    pub report_device_name: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Routing service returning the nearest unicast endpoints.
    #[serde(default = "default_router_url")]
    pub router_url: String,

    /// Addresses the routing service is reached through, one picked at random.
    #[serde(default = "default_router_bootstrap_ips")]
    pub router_bootstrap_ips: Vec<String>,

    #[serde(default = "default_anycast_endpoints")]
    pub anycast_endpoints: Vec<String>,

    #[serde(default = "default_fallback_endpoints")]
    pub fallback_endpoints: Vec<String>,
}

impl UpstreamConfig {
    pub fn upstream_url(&self) -> String {
        format!("{}{}", self.base_url, self.configuration)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            configuration: String::new(),
            report_device_name: true,
            request_timeout_secs: default_request_timeout(),
            router_url: default_router_url(),
            router_bootstrap_ips: default_router_bootstrap_ips(),
            anycast_endpoints: default_anycast_endpoints(),
            fallback_endpoints: default_fallback_endpoints(),
        }
    }
}

fn default_base_url() -> String {
    "https://dns.nextdns.io/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    10
}

fn default_router_url() -> String {
    "https://router.nextdns.io".to_string()
}

fn default_router_bootstrap_ips() -> Vec<String> {
    vec![
        "216.239.32.21".to_string(),
        "216.239.34.21".to_string(),
        "216.239.36.21".to_string(),
        "216.239.38.21".to_string(),
    ]
}

fn default_anycast_endpoints() -> Vec<String> {
    vec![
        "https://dns1.nextdns.io#45.90.28.0".to_string(),
        "https://dns2.nextdns.io#45.90.30.0".to_string(),
    ]
}

fn default_fallback_endpoints() -> Vec<String> {
    vec!["https://d1xovudkxbl47e.cloudfront.net".to_string()]
}
