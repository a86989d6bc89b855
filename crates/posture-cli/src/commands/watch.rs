// Follow a live stream until interrupted

use std::path::Path;

use anyhow::Context;
use futures::StreamExt;
use futures_signals::signal::SignalExt;
use posture_sync::{
    spawn_synchronized_view, HttpEventTransport, StreamConfig, StreamKind, SyncConfig, SyncOutput,
    SynchronizedView,
};
use posture_sync::{ComplianceStream, FleetStream};
use posture_types::fallback::{load_compliance_view, load_fleet_view};
use posture_types::{ComplianceView, FleetView};
use serde::Serialize;
use tracing::{info, warn};

/// Follow the compliance stream.
pub async fn watch_compliance(config: &SyncConfig, fallback: Option<&Path>) -> anyhow::Result<()> {
    let fallback = match fallback {
        Some(path) => load_compliance_view(path)?,
        None => ComplianceView::default(),
    };
    follow::<ComplianceStream>(config, config.compliance_stream(), fallback, |out| {
        let counts = out.data.status_counts();
        format!(
            "{} sections, {} pass / {} fail / {} warning / {} unknown",
            out.data.section_count(),
            counts.pass,
            counts.fail,
            counts.warning,
            counts.unknown
        )
    })
    .await
}

/// Follow the fleet event stream.
pub async fn watch_fleet(config: &SyncConfig, fallback: Option<&Path>) -> anyhow::Result<()> {
    let fallback = match fallback {
        Some(path) => load_fleet_view(path)?,
        None => FleetView::default(),
    };
    follow::<FleetStream>(config, config.fleet_stream(), fallback, |out| {
        format!("{} nodes", out.data.node_count())
    })
    .await
}

async fn follow<K>(
    config: &SyncConfig,
    stream: StreamConfig,
    fallback: K::View,
    describe: fn(&SyncOutput<K::View>) -> String,
) -> anyhow::Result<()>
where
    K: StreamKind,
    K::View: Serialize,
{
    let transport = HttpEventTransport::new(config.connect_timeout())?;
    info!(stream = K::NAME, url = %stream.url, "Watching stream");

    let view = SynchronizedView::<K, _>::new(transport, stream, fallback);
    let handle = spawn_synchronized_view(view);
    handle.set_enabled(true);

    let mut outputs = handle.signal().to_stream();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            result = &mut interrupted => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for interrupt");
                }
                break;
            }
            output = outputs.next() => {
                let Some(output) = output else { break };
                let status = &output.connection_status;
                info!(
                    stream = K::NAME,
                    phase = ?output.phase,
                    connected = status.connected,
                    error = status.error.as_deref().unwrap_or(""),
                    "{}",
                    describe(&output)
                );
                println!("{}", serde_json::to_string(&output).context("failed to render output")?);
            }
        }
    }

    handle.shutdown().await;
    info!(stream = K::NAME, "Stopped watching");
    Ok(())
}
