use ferrous_doh_domain::{BackendKind, CliOverrides, Config};
use std::io::Write;
use std::net::Ipv4Addr;

#[test]
fn test_defaults_use_documentation_range() {
    let config = Config::default();
    assert_eq!(config.tunnel.address, Ipv4Addr::new(192, 0, 2, 43));
    assert_eq!(config.tunnel.gateway, Ipv4Addr::new(192, 0, 2, 42));
    assert_eq!(config.tunnel.netmask, Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(config.tunnel.dns_servers(), vec![config.tunnel.gateway]);
    assert_eq!(config.tunnel.resolver_address(), config.tunnel.gateway);
    assert_eq!(config.tunnel.prefix_len(), 24);
    assert_eq!(config.tunnel.mtu, 1500);
    assert_eq!(config.proxy.retry_interval_secs, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_upstream_url_appends_configuration() {
    let mut config = Config::default();
    config.upstream.configuration = "abc123".to_string();
    assert_eq!(config.upstream.upstream_url(), "https://dns.nextdns.io/abc123");
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = Config::from_toml(
        r#"
[upstream]
configuration = "abc123"

[proxy]
backend = "tunnel"
retry_interval_secs = 2
"#,
    )
    .unwrap();

    assert_eq!(config.upstream.configuration, "abc123");
    assert_eq!(config.proxy.backend, BackendKind::Tunnel);
    assert_eq!(config.proxy.retry_interval_secs, 2);
    assert_eq!(config.upstream.anycast_endpoints.len(), 2);
    assert_eq!(config.tunnel.mtu, 1500);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let err = Config::from_toml("[tunnel\nmtu = 1").unwrap_err();
    assert!(err.to_string().contains("parse"));
}

#[test]
fn test_cli_overrides_win_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[upstream]\nconfiguration = \"from-file\"\n[logging]\nlevel = \"warn\"").unwrap();

    let config = Config::load(
        file.path().to_str(),
        CliOverrides {
            log_level: Some("debug".to_string()),
            configuration: Some("from-cli".to_string()),
            no_report_device: true,
            backend: Some(BackendKind::Native),
        },
    )
    .unwrap();

    assert_eq!(config.upstream.configuration, "from-cli");
    assert_eq!(config.logging.level, "debug");
    assert!(!config.upstream.report_device_name);
    assert_eq!(config.proxy.backend, BackendKind::Native);
}

#[test]
fn test_missing_file_is_read_error() {
    let result = Config::load(Some("/nonexistent/ferrous-doh.toml"), CliOverrides::default());
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_small_mtu() {
    let mut config = Config::default();
    config.tunnel.mtu = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_gateway_equal_to_address() {
    let mut config = Config::default();
    config.tunnel.gateway = config.tunnel.address;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_endpoint() {
    let mut config = Config::default();
    config.upstream.anycast_endpoints = vec!["dns1.nextdns.io".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_bad_router_ip() {
    let mut config = Config::default();
    config.upstream.router_bootstrap_ips = vec!["router".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ferrous-doh.toml");
    let path = path.to_str().unwrap();

    let mut config = Config::default();
    config.upstream.configuration = "saved".to_string();
    config.save(path).unwrap();

    let reloaded = Config::load(Some(path), CliOverrides::default()).unwrap();
    assert_eq!(reloaded.upstream.configuration, "saved");
    assert_eq!(reloaded.tunnel, config.tunnel);
}

#[test]
fn test_backend_kind_parse() {
    assert_eq!("auto".parse::<BackendKind>(), Ok(BackendKind::Auto));
    assert_eq!("TUN".parse::<BackendKind>(), Ok(BackendKind::Tunnel));
    assert_eq!("native".parse::<BackendKind>(), Ok(BackendKind::Native));
    assert!("wireguard".parse::<BackendKind>().is_err());
}
