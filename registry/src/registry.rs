//! Process-global client and mapping registries.
//!
//! Reads (`select`) take the read side; `load`/`unload` serialize on the
//! write side and always take the two locks in the same order, clients
//! first, then mappings, so no partially-registered client is observable.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::RwLock;

use mcp_types::McpError;
use mcp_types::Result;
use tether_config::ClientDsl;
use tether_config::TransportKind;
use tether_config::mapping_base_for;
use tether_host::EnvExpander;
use tether_host::FnRuntime;
use tether_host::HostFs;
use tether_host::MetaSchemaValidator;
use tether_host::ProcessEnv;
use tether_host::ProcessRuntime;
use tether_host::SchemaValidator;
use tether_host::TokioFs;
use tether_mcp_client::RemoteClient;
use tether_mcp_process::MappingData;
use tether_mcp_process::ProcessClient;
use tether_mcp_process::PromptSchema;
use tether_mcp_process::ResourceSchema;
use tether_mcp_process::ToolSchema;
use tether_mcp_process::load_mapping;
use tracing::debug;

use crate::client::Client;

/// Host collaborators the registry wires into every client it loads.
#[derive(Clone)]
pub struct Hosts {
    pub fs: Arc<dyn HostFs>,
    pub env: Arc<dyn EnvExpander>,
    pub validator: Arc<dyn SchemaValidator>,
    pub runtime: Arc<dyn ProcessRuntime>,
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            fs: Arc::new(TokioFs),
            env: Arc::new(ProcessEnv),
            validator: Arc::new(MetaSchemaValidator),
            runtime: Arc::new(FnRuntime::new()),
        }
    }
}

type SharedMapping = Arc<RwLock<MappingData>>;

/// The registry. One process-global instance is created on first use via
/// [`ClientRegistry::global`]; embedders that bring their own host
/// collaborators construct their own.
pub struct ClientRegistry {
    hosts: Hosts,
    clients: RwLock<HashMap<String, Arc<Client>>>,
    mappings: RwLock<HashMap<String, SharedMapping>>,
}

static GLOBAL: LazyLock<ClientRegistry> = LazyLock::new(|| ClientRegistry::new(Hosts::default()));

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ClientRegistry {
    pub fn new(hosts: Hosts) -> Self {
        Self {
            hosts,
            clients: RwLock::new(HashMap::new()),
            mappings: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static ClientRegistry {
        &GLOBAL
    }

    /// Load a client from a DSL file. `id` and `client_type` override the
    /// file contents; with no `id`, the DSL's own id (or the path-derived
    /// one) applies.
    pub async fn load_client(
        &self,
        path: &str,
        id: Option<&str>,
        client_type: Option<&str>,
    ) -> Result<Arc<Client>> {
        let mut dsl =
            ClientDsl::from_path(self.hosts.fs.as_ref(), self.hosts.env.as_ref(), Path::new(path))
                .await?;
        if let Some(id) = id {
            dsl.id = id.to_string();
        }
        if let Some(client_type) = client_type {
            dsl.client_type = Some(client_type.to_string());
        }
        dsl.validate()?;

        self.register(dsl, mapping_base_for(path), None).await
    }

    /// Load a client from an in-memory DSL document (`.yao` syntax). For a
    /// process client, `mapping` overrides the on-disk sidecar files.
    pub async fn load_client_source(
        &self,
        source: &[u8],
        id: &str,
        mapping: Option<MappingData>,
    ) -> Result<Arc<Client>> {
        let mut dsl = ClientDsl::from_slice(
            source,
            Path::new("<source>.mcp.yao"),
            self.hosts.env.as_ref(),
        )?;
        if !id.is_empty() {
            dsl.id = id.to_string();
        }
        dsl.validate()?;

        self.register(dsl, PathBuf::from("mcps/mapping"), mapping).await
    }

    async fn register(
        &self,
        dsl: ClientDsl,
        mapping_base: PathBuf,
        mapping_override: Option<MappingData>,
    ) -> Result<Arc<Client>> {
        let id = dsl.id.clone();

        let (client, mapping) = match dsl.transport {
            TransportKind::Process => {
                let data = match mapping_override {
                    Some(data) => data,
                    None => {
                        load_mapping(
                            self.hosts.fs.as_ref(),
                            self.hosts.validator.as_ref(),
                            &mapping_base,
                            &id,
                            &dsl.tools,
                            &dsl.resources,
                            &dsl.prompts,
                        )
                        .await?
                    }
                };
                let shared: SharedMapping = Arc::new(RwLock::new(data));
                let client = ProcessClient::new(
                    dsl,
                    Arc::clone(&shared),
                    Arc::clone(&self.hosts.runtime),
                    Arc::clone(&self.hosts.fs),
                    &mapping_base,
                );
                (Arc::new(Client::Process(client)), Some(shared))
            }
            _ => (
                Arc::new(Client::Remote(RemoteClient::new(dsl)?)),
                None,
            ),
        };

        // Critical section: clients first, then mappings.
        {
            let mut clients = write(&self.clients);
            let mut mappings = write(&self.mappings);
            if clients.insert(id.clone(), Arc::clone(&client)).is_some() {
                debug!("replacing already-loaded client `{id}`");
            }
            match mapping {
                Some(mapping) => {
                    mappings.insert(id.clone(), mapping);
                }
                None => {
                    mappings.remove(&id);
                }
            }
        }

        Ok(client)
    }

    pub fn select(&self, id: &str) -> Result<Arc<Client>> {
        read(&self.clients)
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::NotFound(format!("client {id}")))
    }

    pub fn exists(&self, id: &str) -> bool {
        read(&self.clients).contains_key(id)
    }

    pub fn list_clients(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.clients).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove a client and (for process clients) its mapping in one
    /// critical section, then close the client.
    pub async fn unload_client(&self, id: &str) -> Result<()> {
        let client = {
            let mut clients = write(&self.clients);
            let mut mappings = write(&self.mappings);
            let client = clients
                .remove(id)
                .ok_or_else(|| McpError::NotFound(format!("client {id}")))?;
            mappings.remove(id);
            client
        };
        client.close().await
    }

    pub fn get_client_mapping(&self, id: &str) -> Result<MappingData> {
        let mapping = read(&self.mappings)
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::NotFound(format!("mapping for client {id}")))?;
        let data = mapping
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        Ok(data)
    }

    /// Merge entries into a client's mapping; existing keys are
    /// overwritten.
    pub fn update_client_mapping(
        &self,
        id: &str,
        tools: HashMap<String, ToolSchema>,
        resources: HashMap<String, ResourceSchema>,
        prompts: HashMap<String, PromptSchema>,
    ) -> Result<()> {
        let mapping = read(&self.mappings)
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::NotFound(format!("mapping for client {id}")))?;
        let mut guard = mapping
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.merge(MappingData {
            tools,
            resources,
            prompts,
        });
        Ok(())
    }

    /// Delete named entries from a client's mapping.
    pub fn remove_client_mapping_items(
        &self,
        id: &str,
        tools: &[String],
        resources: &[String],
        prompts: &[String],
    ) -> Result<()> {
        let mapping = read(&self.mappings)
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::NotFound(format!("mapping for client {id}")))?;
        let mut guard = mapping
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove_items(tools, resources, prompts);
        Ok(())
    }
}
