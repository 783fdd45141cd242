// src/session.rs

//! The long-lived `serve` step: reload server, file watcher and watch loop
//! wired together until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent};
use crate::exec::UnitExecutor;
use crate::reload::server::client_tag;
use crate::reload::{ClientRegistry, ReloadServer, Upstream};
use crate::sink::ErrorSink;
use crate::units::{AssetUnits, BuildContext};
use crate::watch::{build_bindings, spawn_watcher};

/// Everything a serve session needs, shared with the one-off steps.
#[derive(Debug, Clone)]
pub struct Session {
    cfg: Arc<ConfigFile>,
    ctx: BuildContext,
    units: Arc<AssetUnits>,
    sink: ErrorSink,
}

impl Session {
    pub fn new(
        cfg: Arc<ConfigFile>,
        ctx: BuildContext,
        units: Arc<AssetUnits>,
        sink: ErrorSink,
    ) -> Self {
        Self {
            cfg,
            ctx,
            units,
            sink,
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.cfg.server().port))
    }
}

/// Start the reload server and the watch loop; returns after shutdown.
pub async fn serve(session: Session) -> Result<()> {
    let addr = session.listen_addr();
    let Session {
        cfg,
        ctx,
        units,
        sink,
    } = session;

    let upstream = cfg
        .project_url()
        .map(Upstream::parse)
        .transpose()
        .context("parsing project_url")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding reload server on {addr}"))?;
    info!(%addr, upstream = ?upstream.as_ref().map(ToString::to_string), "reload server listening");

    let proxied = upstream.is_some();
    let registry = Arc::new(ClientRegistry::new());
    let server = tokio::spawn(ReloadServer::new(Arc::clone(&registry), upstream).serve(listener));
    let server_abort = server.abort_handle();

    // A dead reload server means no browser hears about rebuilds again.
    {
        let sink = sink.clone();
        tokio::spawn(async move {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => sink.report("reload server", &format!("{err:#}")),
                Err(err) if err.is_cancelled() => {}
                Err(err) => sink.report("reload server", &format!("reload server panicked: {err}")),
            }
        });
    }

    if proxied {
        info!("open http://{addr}/ to browse the site with live reload");
    } else {
        info!(
            tag = %client_tag(&format!("http://{addr}")),
            "no project_url; add this tag to the theme's pages for live reload"
        );
    }

    let bindings = Arc::new(build_bindings(&cfg)?);
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let _watcher = spawn_watcher(
        ctx.root.clone(),
        Arc::clone(&bindings),
        Arc::clone(&ctx.fs),
        rt_tx.clone(),
    )?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let core = CoreRuntime::new(&bindings);
    let executor = UnitExecutor::new(units, ctx, sink, rt_tx);
    let result = Runtime::new(core, rt_rx, executor, registry).run().await;

    server_abort.abort();
    result
}
