use std::fmt::Debug;

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientConfigBuilder {
    base_url: String,
    agent: Option<String>,
}

impl ClientConfigBuilder {
    /// Creates a builder with the given API base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            agent: None,
        }
    }

    /// Selects a named server-side agent to run turns with. When unset,
    /// the server picks its default agent.
    #[inline]
    pub fn with_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            agent: self.agent,
        }
    }
}

/// Configuration for [`AgentClient`](crate::AgentClient).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) agent: Option<String>,
}
