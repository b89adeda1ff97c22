//! TCP accept loop.
//!
//! Each accepted stream is registered, wrapped in a [`Connection`] and driven
//! on its own task.  The task's abort handle goes into the registry so
//! `stop()` and the broadcast pipeline can force-close it.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::domain::connection::ConnectionId;
use crate::infrastructure::connection::{Connection, ConnectionContext};

/// Pause after a failed `accept` (e.g. out of file descriptors) so the loop
/// does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Spawns the accept loop.  It runs until the returned handle is aborted.
pub fn spawn_accept_loop(listener: TcpListener, ctx: Arc<ConnectionContext>) -> JoinHandle<()> {
    tokio::spawn(accept_loop(listener, ctx))
}

async fn accept_loop(listener: TcpListener, ctx: Arc<ConnectionContext>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY for {peer}: {e}");
        }

        let id = ConnectionId::new();
        let peer = peer.to_string();
        if !ctx.registry.register(id, peer.clone()) {
            // The server is stopping; dropping the stream closes it.
            return;
        }
        debug!("connection {id}: accepted from {peer}");

        let conn = Connection::new(id, peer, stream, Arc::clone(&ctx));
        let task = tokio::spawn(conn.run());
        ctx.registry.attach_task(id, task.abort_handle());
    }
}
