//! Authentication adapter.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::PluginContext;
use crate::plugin::{Capability, Plugin, PluginError};
use crate::result::PluginResult;

use super::AdapterSettings;

/// Identity established by an [`Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user.
    pub user_id: String,
    /// Client application acting for the user, if any.
    pub client_id: Option<String>,
}

impl Principal {
    /// A principal without a client.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: None,
        }
    }

    /// Sets the client id.
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Establishes who is making a request.
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Authenticates the request described by `ctx`.
    ///
    /// A [`PluginError::Rejected`] carries its own status; any other error
    /// is reported as `401 Unauthorized`.
    async fn authenticate(&self, ctx: &PluginContext) -> Result<Principal, PluginError>;
}

/// Runs an [`Authenticator`] in BEFORE and records the principal on the
/// context.
#[derive(Debug)]
pub struct AuthenticationPlugin {
    settings: AdapterSettings,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenticationPlugin {
    /// Creates the adapter with priority 10.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            settings: AdapterSettings::new("authentication", Capability::Authentication),
            authenticator,
        }
    }

    adapter_builders!();
}

#[async_trait]
impl Plugin for AuthenticationPlugin {
    adapter_metadata!();

    async fn before(&self, ctx: &PluginContext) -> Result<PluginResult, PluginError> {
        match self.authenticator.authenticate(ctx).await {
            Ok(principal) => {
                debug!(
                    plugin = %self.settings.name,
                    user_id = %principal.user_id,
                    "Request authenticated"
                );
                ctx.set_user_id(principal.user_id);
                if let Some(client_id) = principal.client_id {
                    ctx.set_client_id(client_id);
                }
                Ok(PluginResult::Continue)
            }
            Err(PluginError::Rejected { status, message }) => {
                Ok(PluginResult::abort(status, message))
            }
            Err(e) => Ok(PluginResult::abort(
                StatusCode::UNAUTHORIZED,
                format!("Authentication failed: {}", e),
            )),
        }
    }
}
