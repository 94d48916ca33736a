//! HTTP server

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use assetpress_core::config::ServerConfig;
use assetpress_core::{Error, Result};
use assetpress_static::{Body, FileServer, FileServerConfig, not_found};

/// A file server mounted under a path prefix
#[derive(Debug, Clone)]
pub struct StaticService {
    /// Prefix without trailing slash; empty when mounted at `/`
    prefix: String,
    files: FileServer,
}

impl StaticService {
    /// Mount `files` under `prefix`
    pub fn new(prefix: &str, files: FileServer) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            files,
        }
    }

    /// Build the service described by a server config
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.prefix, FileServer::new(FileServerConfig::from(config)))
    }

    /// The mounted file server
    pub fn files(&self) -> &FileServer {
        &self.files
    }

    /// Remove the mount prefix, keeping a leading `/`.
    ///
    /// Only whole segments match: `/static` mounts `/static/app.js` but not
    /// `/staticfoo`.
    pub fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(self.prefix.as_str())? {
            "" => Some("/"),
            rest if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }

    /// Handle a request
    pub async fn handle<B>(&self, req: &Request<B>) -> Response<Body> {
        let path = req.uri().path();
        let Some(path) = self.strip_prefix(path) else {
            tracing::debug!("{} is outside mount prefix {}", path, self.prefix);
            return not_found();
        };
        self.files.serve(req.method(), path, req.headers()).await
    }
}

/// Bind a listener
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))
}

/// Serve connections from `listener` until the task is dropped
pub async fn serve(listener: TcpListener, service: Arc<StaticService>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("📁 File server listening on http://{}", addr);
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Accept error: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            let handler = service_fn(move |req: Request<hyper::body::Incoming>| {
                let service = service.clone();
                // the body is never read
                let req = req.map(|_| ());
                async move { Ok::<_, Infallible>(service.handle(&req).await) }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                tracing::debug!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

/// Bind and serve a server config
pub async fn run_server(config: &ServerConfig) -> Result<()> {
    let addr = config.listen_addr()?;
    let listener = bind(addr).await?;
    tracing::info!("📂 Serving {} under {}", config.root, config.prefix);
    serve(listener, Arc::new(StaticService::from_config(config))).await
}
