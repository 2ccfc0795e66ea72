use domain::UnitSystem;
use hc_config::{AppConfig, GatewayTransport};

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("HC_GATEWAY_ID", "3");
        std::env::set_var("HC_GATEWAY_KIND", "mqtt");
        std::env::set_var("HC_MQTT_HOST", "broker.local");
        std::env::set_var("HC_MQTT_TOPICS_SUBSCRIBE", "gw-out, gw2-out");
        std::env::set_var("HC_MQTT_TOPIC_PUBLISH", "gw-in");
        std::env::set_var("HC_UNIT_SYSTEM", "imperial");
        std::env::set_var("HC_FIRMWARE_FALLBACK_TO_DEFAULT", "on");
        std::env::set_var("HC_DEFAULT_FIRMWARE_ID", "9");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.gateway.id, 3);
    assert_eq!(config.gateway.name, "gateway-3");
    match &config.gateway.transport {
        GatewayTransport::Mqtt {
            host,
            port,
            topics_subscribe,
            topic_publish,
            ..
        } => {
            assert_eq!(host, "broker.local");
            assert_eq!(*port, 1883);
            assert_eq!(topics_subscribe, &vec!["gw-out".to_string(), "gw2-out".to_string()]);
            assert_eq!(topic_publish, "gw-in");
        }
        other => panic!("unexpected transport: {other:?}"),
    }
    assert_eq!(config.unit_system, UnitSystem::Imperial);
    assert!(config.firmware_fallback_to_default);
    assert_eq!(config.default_firmware_id, Some(9));
    assert_eq!(config.message_pacing_ms, 30);
    assert_eq!(config.reconnect_backoff_ms, 5_000);
    assert_eq!(config.shutdown_timeout_seconds, 300);
    assert_eq!((config.node_id_min, config.node_id_max), (1, 254));
}
