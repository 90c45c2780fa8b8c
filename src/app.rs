//! Server assembly and serving.

use crate::cli::RunArgs;
use arc_swap::ArcSwap;
use grok_bridge_core::config::Config;
use grok_bridge_core::conversation::InMemoryConversationStore;
use grok_bridge_core::lifecycle::signal::SignalHandler;
use grok_bridge_core::rate_limit::RateLimiter;
use grok_bridge_provider::grok::GrokExecutor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(300);

pub struct Application {
    config: Arc<ArcSwap<Config>>,
    app_router: axum::Router,
    config_path: String,
    rate_limiter: Arc<RateLimiter>,
}

impl Application {
    /// Load config, apply CLI overrides and assemble the router.
    pub fn build(args: &RunArgs) -> anyhow::Result<Self> {
        let mut config = Config::load(&args.config).unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load config from '{}': {e}, using defaults",
                args.config
            );
            Config::default()
        });

        if let Some(ref host) = args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }

        tracing::info!(
            upstream = %config.upstream.url,
            default_model = %config.upstream.default_model,
            proxy = config.proxy_url.is_some(),
            rate_limit = config.rate_limit.enabled,
            "Configuration loaded"
        );

        let conversations = Arc::new(InMemoryConversationStore::new(&config.conversations));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let config = Arc::new(ArcSwap::from_pointee(config));
        let upstream = Arc::new(GrokExecutor::new(config.clone()));

        let state = grok_bridge_server::AppState {
            config: config.clone(),
            conversations,
            upstream,
            rate_limiter: rate_limiter.clone(),
        };
        let app_router = grok_bridge_server::build_router(state);

        Ok(Self {
            config,
            app_router,
            config_path: args.config.clone(),
            rate_limiter,
        })
    }

    /// Serve until SIGINT/SIGTERM; SIGHUP reloads the config file in place.
    pub async fn serve(self) -> anyhow::Result<()> {
        let Self {
            config,
            app_router,
            config_path,
            rate_limiter,
        } = self;

        let (signal_handler, mut shutdown_rx) = SignalHandler::new();

        let reload_config = config.clone();
        let reload_rate_limiter = rate_limiter.clone();
        let reload_fn = move || match Config::load(&config_path) {
            Ok(mut new_cfg) => {
                // Listener address is fixed for the life of the process
                let current = reload_config.load();
                new_cfg.host = current.host.clone();
                new_cfg.port = current.port;
                reload_rate_limiter.update_config(&new_cfg.rate_limit);
                tracing::info!(
                    upstream = %new_cfg.upstream.url,
                    rate_limit = new_cfg.rate_limit.enabled,
                    "SIGHUP reload applied"
                );
                reload_config.store(Arc::new(new_cfg));
            }
            Err(e) => {
                tracing::error!("SIGHUP config reload failed: {e}");
            }
        };
        tokio::spawn(signal_handler.run(reload_fn));

        let purge_limiter = rate_limiter.clone();
        let mut purge_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMIT_PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => purge_limiter.purge_idle(),
                    _ = purge_shutdown.changed() => break,
                }
            }
        });

        let addr = {
            let cfg = config.load();
            format!("{}:{}", cfg.host, cfg.port)
        };
        tracing::info!("Starting HTTP server on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|v| *v).await;
        };

        axum::serve(
            listener,
            app_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!("Server shut down.");
        Ok(())
    }
}
