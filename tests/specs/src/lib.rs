// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end scenario tests: worlds driven through the real
//! event loop, and the simulator exercised over real sockets.
//!
//! The event loop runs on its own thread with a current-thread runtime: the
//! script host is deliberately not `Send`, exactly as in production where
//! the loop owns it for the whole process lifetime.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use signalbox::exec::{EventLoop, EventLoopHandle};
use signalbox::script::ScriptHost;
use signalbox::world::World;

pub use signalbox::test_support as board;

/// A world running under its own event loop.
pub struct LiveWorld {
    pub handle: EventLoopHandle,
    cancel: CancellationToken,
    join: Option<std::thread::JoinHandle<()>>,
    result_rx: tokio::sync::oneshot::Receiver<World>,
}

impl LiveWorld {
    pub fn start(world: World) -> anyhow::Result<Self> {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();

        let join = std::thread::spawn(move || {
            let Ok(runtime) =
                tokio::runtime::Builder::new_current_thread().enable_all().build()
            else {
                return;
            };
            runtime.block_on(async move {
                let event_loop = EventLoop::new(world, ScriptHost::new());
                let _ = handle_tx.send(event_loop.handle());
                let (world, _host) = event_loop.run(loop_cancel).await;
                let _ = result_tx.send(world);
            });
        });

        let handle = handle_rx.recv_timeout(Duration::from_secs(5))?;
        Ok(Self { handle, cancel, join: Some(join), result_rx })
    }

    /// Post a closure and wait for its result.
    pub async fn call<F, R>(&self, f: F) -> anyhow::Result<R>
    where
        F: FnOnce(&mut World) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.handle.call(move |world, _host| {
            let _ = tx.send(f(world));
        });
        Ok(tokio::time::timeout(Duration::from_secs(5), rx).await??)
    }

    /// Stop the loop and hand back the world for final assertions.
    pub async fn shutdown(mut self) -> anyhow::Result<World> {
        self.cancel.cancel();
        // Nudge the loop so the select wakes promptly.
        self.handle.call(|_world, _host| {});
        let world = tokio::time::timeout(Duration::from_secs(5), &mut self.result_rx).await??;
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        Ok(world)
    }
}

/// Poll `predicate` through the event loop until it holds or `timeout`
/// elapses.
pub async fn wait_for<F>(live: &LiveWorld, predicate: F, timeout: Duration) -> bool
where
    F: Fn(&World) -> bool + Send + Clone + 'static,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let check = predicate.clone();
        let hit = live.call(move |world| check(world)).await.unwrap_or(false);
        if hit {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
