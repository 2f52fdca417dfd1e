use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct DeviceMetrics {
    pub reads: IntCounter,
    pub read_failures: IntCounter,
    pub writes: IntCounter,
    pub write_failures: IntCounter,
    pub devices_resolved: IntGauge,
    pub devices_unresolved: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub dev: DeviceMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| {
            IntCounter::new(name, help).map_err(|e| format!("metrics init error: {e}"))
        };
        let gauge = |name: &str, help: &str| {
            IntGauge::new(name, help).map_err(|e| format!("metrics init error: {e}"))
        };
        let dev = DeviceMetrics {
            reads: counter("battery_reads_total", "Total device reads attempted")?,
            read_failures: counter("battery_read_failures_total", "Device reads that failed")?,
            writes: counter("battery_writes_total", "Total device writes attempted")?,
            write_failures: counter(
                "battery_write_failures_total",
                "Device writes that failed",
            )?,
            devices_resolved: gauge(
                "battery_devices_resolved",
                "Devices classified as readable or writable",
            )?,
            devices_unresolved: gauge(
                "battery_devices_unresolved",
                "Configured devices that could not be resolved",
            )?,
        };
        let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
            Box::new(dev.reads.clone()),
            Box::new(dev.read_failures.clone()),
            Box::new(dev.writes.clone()),
            Box::new(dev.write_failures.clone()),
            Box::new(dev.devices_resolved.clone()),
            Box::new(dev.devices_unresolved.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .map_err(|e| format!("metrics registration error: {e}"))?;
        }
        Ok(Self { registry, dev })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text_contains_counters() {
        let hub = MetricsHub::new().unwrap();
        hub.dev.reads.inc();
        hub.dev.devices_resolved.set(3);
        let text = hub.encode_text();
        assert!(text.contains("battery_reads_total 1"));
        assert!(text.contains("battery_devices_resolved 3"));
    }

    #[test]
    fn test_every_metric_is_registered() {
        let hub = MetricsHub::new().unwrap();
        let mut names: Vec<String> = hub
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "battery_devices_resolved",
                "battery_devices_unresolved",
                "battery_read_failures_total",
                "battery_reads_total",
                "battery_write_failures_total",
                "battery_writes_total",
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_is_reported() {
        let hub = MetricsHub::new().unwrap();
        let err = hub
            .registry
            .register(Box::new(hub.dev.reads.clone()))
            .unwrap_err();
        assert!(matches!(err, prometheus::Error::AlreadyReg));
    }
}
