// metrics/mod.rs
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn setup_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to setup metrics: {}", e))?;

    metrics::describe_counter!(
        "meross_commands_queued_total",
        "Commands accepted by the HTTP API"
    );
    metrics::describe_counter!(
        "meross_commands_applied_total",
        "Commands applied to the device"
    );
    metrics::describe_counter!(
        "meross_commands_failed_total",
        "Commands that failed against the device"
    );
    metrics::describe_gauge!("meross_ready", "1 while a device is bound");
    tracing::info!("Prometheus exporter listening on {}", addr);
    Ok(())
}
