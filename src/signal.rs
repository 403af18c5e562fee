use tokio_util::sync::CancellationToken;

/// Translates Ctrl+C into cancelling the given token. Run this alongside the
/// serving loop and hand the graph's root token in, so the operator's signal
/// becomes the shutdown trigger.
pub async fn cancel_on_ctrl_c(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Ctrl+C signal error: {}", e);
    } else {
        log::info!("Received Ctrl+C. Requesting graceful shutdown...");
        token.cancel();
    }
}
