pub mod conntrack_source_port;
pub mod metrics_port;
