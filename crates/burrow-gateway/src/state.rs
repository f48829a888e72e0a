//! Gateway application state.
//!
//! Built once at startup and shared by every request handler.

use std::sync::Arc;

use burrow_auth::TokenValidator;
use burrow_control::TunnelOrchestrator;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<C, V>
where
    C: TunnelOrchestrator,
    V: TokenValidator,
{
    /// The tunnel orchestrator.
    pub control: Arc<C>,
    /// The bearer token validator.
    pub validator: Arc<V>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C, V> GatewayState<C, V>
where
    C: TunnelOrchestrator,
    V: TokenValidator,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(control: Arc<C>, validator: Arc<V>, config: GatewayConfig) -> Self {
        Self {
            control,
            validator,
            config,
        }
    }
}

impl<C, V> Clone for GatewayState<C, V>
where
    C: TunnelOrchestrator,
    V: TokenValidator,
{
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            validator: Arc::clone(&self.validator),
            config: self.config.clone(),
        }
    }
}
