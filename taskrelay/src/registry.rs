//! Server registry
//!
//! Owns provider sessions and their cached tool catalogs. Descriptors and live sessions are
//! kept in two separate maps behind one lookup interface. Each session sits behind its own
//! mutex so invocations against one provider are serialized while different providers run
//! concurrently.

use crate::config::ProviderConfig;
use crate::error::{RelayError, RelayResult};
use crate::mcp::{LaunchSpec, McpStdioSession, ProviderSession, Tool};
use crate::utils::bounded;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// A registered provider: its purpose and cached catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub description: String,
    pub catalog: Vec<Tool>,
}

impl ServerDescriptor {
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.catalog.iter().find(|t| t.name == name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tool(name).is_some()
    }
}

type SharedSession = Arc<Mutex<Box<dyn ProviderSession>>>;

pub struct ServerRegistry {
    descriptors: RwLock<IndexMap<String, ServerDescriptor>>,
    sessions: RwLock<HashMap<String, SharedSession>>,
    handshake_timeout: Option<Duration>,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(IndexMap::new()),
            sessions: RwLock::new(HashMap::new()),
            handshake_timeout: None,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Launch a provider, perform its handshake and cache its catalog.
    pub async fn register(
        &self,
        name: &str,
        description: &str,
        launch: &LaunchSpec,
    ) -> RelayResult<ServerDescriptor> {
        let session = bounded(
            &format!("handshake with '{}'", name),
            self.handshake_timeout,
            McpStdioSession::connect(name, launch),
        )
        .await
        .map_err(|e| startup_error(name, e))?;
        self.attach(name, description, Box::new(session)).await
    }

    /// Register an already-connected session. The catalog is listed once and cached.
    pub async fn attach(
        &self,
        name: &str,
        description: &str,
        session: Box<dyn ProviderSession>,
    ) -> RelayResult<ServerDescriptor> {
        let catalog = match bounded(
            &format!("tool listing for '{}'", name),
            self.handshake_timeout,
            session.list_tools(),
        )
        .await
        {
            Ok(catalog) => catalog,
            Err(e) => {
                if let Err(shutdown_err) = session.shutdown().await {
                    warn!(provider = %name, "failed to stop provider after handshake error: {}", shutdown_err);
                }
                return Err(startup_error(name, e));
            }
        };

        let descriptor = ServerDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            catalog,
        };
        info!(
            provider = %name,
            tools = descriptor.catalog.len(),
            "registered provider"
        );

        let previous = self
            .sessions
            .write()
            .await
            .insert(name.to_string(), Arc::new(Mutex::new(session)));
        if let Some(previous) = previous {
            // waits for any in-flight call on the replaced session
            if let Err(e) = previous.lock().await.shutdown().await {
                warn!(provider = %name, "failed to stop replaced provider: {}", e);
            }
            info!(provider = %name, "replaced previous provider session");
        }
        self.descriptors
            .write()
            .await
            .insert(name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Register every configured provider. A provider that fails to start is logged and
    /// excluded; the others are unaffected. Returns the failures.
    pub async fn register_all(
        &self,
        providers: &IndexMap<String, ProviderConfig>,
    ) -> Vec<(String, RelayError)> {
        let mut failures = Vec::new();
        for (name, provider) in providers {
            let description = provider.description.clone().unwrap_or_default();
            let launch = LaunchSpec::from(provider);
            if let Err(e) = self.register(name, &description, &launch).await {
                error!(provider = %name, "provider unavailable: {}", e);
                failures.push((name.clone(), e));
            }
        }
        failures
    }

    /// Forward one call to the provider's live session and return its raw text output.
    pub async fn invoke(
        &self,
        name: &str,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> RelayResult<String> {
        let session = self
            .sessions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::UnknownProvider(name.to_string()))?;
        let session = session.lock().await;
        session.call_tool(tool, arguments).await
    }

    /// Cached catalog of a provider; `refresh` re-lists the tools first.
    pub async fn list_catalog(&self, name: &str, refresh: bool) -> RelayResult<Vec<Tool>> {
        if refresh {
            self.refresh_catalog(name).await?;
        }
        self.descriptors
            .read()
            .await
            .get(name)
            .map(|d| d.catalog.clone())
            .ok_or_else(|| RelayError::UnknownProvider(name.to_string()))
    }

    async fn refresh_catalog(&self, name: &str) -> RelayResult<()> {
        let session = self
            .sessions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::UnknownProvider(name.to_string()))?;
        let catalog = {
            let session = session.lock().await;
            session.list_tools().await?
        };
        if let Some(descriptor) = self.descriptors.write().await.get_mut(name) {
            descriptor.catalog = catalog;
        }
        Ok(())
    }

    pub async fn descriptor(&self, name: &str) -> Option<ServerDescriptor> {
        self.descriptors.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.descriptors.read().await.contains_key(name)
    }

    pub async fn has_tool(&self, provider: &str, tool: &str) -> bool {
        self.descriptors
            .read()
            .await
            .get(provider)
            .map(|d| d.has_tool(tool))
            .unwrap_or(false)
    }

    /// Registered provider names in registration order
    pub async fn provider_names(&self) -> Vec<String> {
        self.descriptors.read().await.keys().cloned().collect()
    }

    /// Snapshot of every provider, optionally refreshing catalogs. Providers whose refresh
    /// fails keep their cached catalog.
    pub async fn servers(&self, refresh: bool) -> Vec<ServerDescriptor> {
        if refresh {
            for name in self.provider_names().await {
                if let Err(e) = self.refresh_catalog(&name).await {
                    warn!(provider = %name, "catalog refresh failed: {}", e);
                }
            }
        }
        self.descriptors.read().await.values().cloned().collect()
    }

    /// Catalog-derived description block for every provider, used in planning prompts
    pub async fn describe_providers(&self) -> String {
        let descriptors = self.descriptors.read().await;
        describe_descriptors(descriptors.values())
    }

    /// Terminate every provider process
    pub async fn shutdown(&self) {
        let sessions: Vec<(String, SharedSession)> = self
            .sessions
            .write()
            .await
            .drain()
            .collect();
        for (name, session) in sessions {
            if let Err(e) = session.lock().await.shutdown().await {
                warn!(provider = %name, "provider shutdown failed: {}", e);
            }
        }
        self.descriptors.write().await.clear();
    }
}

fn startup_error(name: &str, e: RelayError) -> RelayError {
    match e {
        RelayError::ProviderStartup { .. } => e,
        other => RelayError::ProviderStartup {
            provider: name.to_string(),
            message: other.to_string(),
        },
    }
}

/// Render provider descriptions with their tool lists, in the given order.
pub fn describe_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a ServerDescriptor>) -> String {
    let blocks: Vec<String> = descriptors
        .into_iter()
        .enumerate()
        .map(|(idx, descriptor)| {
            let mut description = descriptor
                .description
                .replace("You provide the", "The assistant has");
            description.push_str(&format!(
                "\n\nAvailable tools for Assistant {} - {}:\n",
                idx + 1,
                descriptor.name
            ));
            for tool in &descriptor.catalog {
                description.push_str(&format!("- {}: {}\n", tool.name, tool.short_description()));
            }
            format!(
                "assistant name: {}\n=================\n{}\n",
                descriptor.name, description
            )
        })
        .collect();
    format!("\n{}", blocks.join("\n"))
}
