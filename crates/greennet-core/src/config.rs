// ── Runtime gateway configuration ──
//
// Describes which gateway to synchronize with and the timing knobs of
// the engine. Broker connection settings live with the transport; the
// CLI builds a `GatewayConfig` and hands it in. Core never reads files.

use std::time::Duration;

use greennet_api::topic::DEFAULT_BASE;

/// Configuration for one gateway connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway identifier, the topic segment after the base.
    pub gateway_id: String,
    /// Topic base (defaults to `EnOcean`).
    pub topic_base: String,
    /// How long to wait for the device snapshot after connecting.
    pub bootstrap_timeout: Duration,
    /// Default answer timeout for commands and requests.
    pub command_timeout: Duration,
    /// Quiet period before assembling fragmented messages.
    pub fragment_quiet_period: Duration,
    /// How long an abandoned command keeps consuming its late answer.
    pub late_answer_grace: Duration,
    /// Stream messages buffered while bootstrapping.
    pub replay_buffer: usize,
}

impl GatewayConfig {
    pub fn new(gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            ..Self::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_id: String::new(),
            topic_base: DEFAULT_BASE.into(),
            bootstrap_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            fragment_quiet_period: Duration::from_millis(75),
            late_answer_grace: Duration::from_secs(30),
            replay_buffer: 1024,
        }
    }
}
