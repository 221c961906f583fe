//! Shared application state.

use gatehouse_access::LoginRedirector;
use gatehouse_directory::DirectoryClient;

/// State shared by all request handlers.
pub struct AppState {
    /// Decides where admin login requests go.
    pub redirector: LoginRedirector,
    /// KeyCloak admin client, connected once at startup.
    pub directory: DirectoryClient,
    /// Whether to honour `X-Forwarded-Proto`.
    pub trust_forwarded_proto: bool,
    /// Hosts the `Host` header may name. Empty accepts any host.
    pub allowed_hosts: Vec<String>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        redirector: LoginRedirector,
        directory: DirectoryClient,
        trust_forwarded_proto: bool,
    ) -> Self {
        Self {
            redirector,
            directory,
            trust_forwarded_proto,
            allowed_hosts: Vec::new(),
        }
    }

    /// Restricts the hosts accepted from the `Host` header.
    #[must_use]
    pub fn with_allowed_hosts(mut self, allowed_hosts: Vec<String>) -> Self {
        self.allowed_hosts = allowed_hosts;
        self
    }
}
