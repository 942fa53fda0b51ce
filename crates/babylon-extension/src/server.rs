//! Extension server.
//!
//! Hosts one or more extensions on a single listener. Self-registration runs
//! next to the server; if it gives up, the server is stopped and `serve`
//! returns the registration error so the process can abort.

use std::collections::HashSet;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use babylon_core::ExtensionCategory;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::capability::{Executable, Reporter};
use crate::config::ServerConfig;
use crate::dispatcher::DispatchContext;
use crate::extension::Extension;
use crate::registrar::{HttpTransport, RegistrationError, RegistrationTransport};
use crate::shutdown::cancel_on_signal;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("No extensions to serve")]
    NoExtensions,

    #[error("Duplicate extension {category} '{name}'")]
    DuplicateExtension {
        category: ExtensionCategory,
        name: String,
    },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Registration task failed: {0}")]
    Task(String),
}

/// Builder and runner for an extension process.
pub struct ExtensionServer {
    extensions: Vec<Extension>,
    config: ServerConfig,
    transport: Option<Arc<dyn RegistrationTransport>>,
}

impl Default for ExtensionServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionServer {
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
            config: ServerConfig::default(),
            transport: None,
        }
    }

    pub fn for_driver(capability: impl Executable) -> Self {
        Self::new().with_extension(Extension::driver(capability))
    }

    pub fn for_actor(capability: impl Executable) -> Self {
        Self::new().with_extension(Extension::actor(capability))
    }

    pub fn for_reporter(capability: impl Reporter) -> Self {
        Self::new().with_extension(Extension::reporter(capability))
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the self-registration transport (HTTP by default).
    pub fn with_transport(mut self, transport: Arc<dyn RegistrationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Routes of every hosted extension, with the request body limit applied.
    ///
    /// Two extensions with the same category and name cannot be told apart
    /// by the protocol, so they are refused here.
    pub fn router(&self, context: &DispatchContext) -> Result<Router, ServerError> {
        if self.extensions.is_empty() {
            return Err(ServerError::NoExtensions);
        }

        let mut seen = HashSet::new();
        let mut router = Router::new();
        for extension in &self.extensions {
            let key = (extension.category(), extension.name().to_lowercase());
            if !seen.insert(key) {
                return Err(ServerError::DuplicateExtension {
                    category: extension.category(),
                    name: extension.name().to_string(),
                });
            }
            router = router.merge(extension.setup_endpoints(context));
        }

        Ok(router.layer(tower_http::limit::RequestBodyLimitLayer::new(
            self.config.body_limit_bytes,
        )))
    }

    /// Bind the configured port on all interfaces.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(("0.0.0.0", self.config.port)).await?)
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    ///
    /// The callback URL advertised to the orchestrator uses the port the
    /// listener actually got, so binding port 0 works.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let port = listener.local_addr()?.port();
        let context = DispatchContext::from_config(&self.config)?;
        let orchestrator = self.config.orchestrator.address();
        let policy = self.config.registration.retry_policy();

        for extension in &self.extensions {
            let registrar = extension.registrar();
            extension.set_remote_server(orchestrator.clone());
            registrar.set_advertised(self.config.hostname.clone(), port);
            registrar.set_retry_policy(policy);
        }

        let app = self.router(&context)?;
        info!(
            category = "server",
            port = port,
            extensions = self.extensions.len(),
            orchestrator = %orchestrator,
            "Extension server started"
        );

        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| Arc::new(HttpTransport::new(context.http.clone())));
        let mut registrations = JoinSet::new();
        for extension in self.extensions.iter().filter(|e| e.connect_on_startup()) {
            let extension = extension.clone();
            let transport = transport.clone();
            let cancel = shutdown.clone();
            registrations.spawn(async move {
                extension
                    .register_remote(transport.as_ref(), &cancel)
                    .await
                    .map(|_| ())
            });
        }

        let server_shutdown = shutdown.clone();
        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .into_future();

        let serving = async {
            let result = server.await;
            shutdown.cancel();
            result
        };

        let registering = async {
            while let Some(joined) = registrations.join_next().await {
                let failure = match joined {
                    Ok(Ok(())) | Ok(Err(RegistrationError::Cancelled { .. })) => continue,
                    Ok(Err(e)) => ServerError::Registration(e),
                    Err(e) => ServerError::Task(e.to_string()),
                };
                error!(category = "server", error = %failure, "Stopping server");
                shutdown.cancel();
                return Err(failure);
            }
            Ok(())
        };

        let (served, registered) = tokio::join!(serving, registering);
        served?;
        registered?;

        info!(category = "server", "Extension server stopped");
        Ok(())
    }

    /// Bind, serve and stop on Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = CancellationToken::new();
        tokio::spawn(cancel_on_signal(shutdown.clone()));

        let listener = self.bind().await?;
        let result = self.serve(listener, shutdown.clone()).await;
        shutdown.cancel();
        result
    }
}
