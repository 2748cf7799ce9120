// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenarios that need the real event loop, timers or sockets: delayed
//! release, kernel fault propagation, simulator discovery.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::codec::Framed;

use signalbox::enums::InterfaceState;
use signalbox::hw::frame::{opcode, CanAsciiCodec, CanFrame};
use signalbox::hw::interface::{add_interface, set_online, Interface};
use signalbox::hw::io::IoConfig;
use signalbox::interlock;
use signalbox::world::World;
use signalbox_specs::{board, wait_for, LiveWorld};

const TIMEOUT: Duration = Duration::from_secs(5);

// -- delayed release ----------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn delayed_release_fires_once() -> anyhow::Result<()> {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    board::straight(&mut world, 0, 1);
    let b1 = board::block(&mut world, "b1", 0, 2);
    world.board_modified();
    let train = world.add_train("t");
    world.assign_train(b0, train);

    let live = LiveWorld::start(world)?;
    let reserved = live
        .call(move |world| {
            let path = board::path_between(world, b0, b1)?;
            interlock::reserve(world, path, train, false).then_some(path)
        })
        .await?;
    let Some(path) = reserved else {
        anyhow::bail!("reservation failed");
    };

    live.call(move |world| interlock::delayed_release(world, path, 50)).await?;

    let released = wait_for(
        &live,
        move |world| world.paths.get(path).is_some_and(|p| !p.is_reserved()),
        TIMEOUT,
    )
    .await;
    assert!(released, "delayed release never fired");
    live.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn delayed_release_is_cancelled_by_a_new_reservation() -> anyhow::Result<()> {
    let mut world = World::new();
    let b0 = board::block(&mut world, "b0", 0, 0);
    board::straight(&mut world, 0, 1);
    let b1 = board::block(&mut world, "b1", 0, 2);
    world.board_modified();
    let train = world.add_train("t");
    world.assign_train(b0, train);

    let live = LiveWorld::start(world)?;
    let path = live
        .call(move |world| {
            let path = board::path_between(world, b0, b1)?;
            interlock::reserve(world, path, train, false).then_some(path)
        })
        .await?;
    let Some(path) = path else {
        anyhow::bail!("reservation failed");
    };

    // Schedule, then release and re-reserve before the timer fires: the
    // stale timer must not release the new reservation.
    live.call(move |world| interlock::delayed_release(world, path, 100)).await?;
    live.call(move |world| {
        assert!(interlock::release(world, path, false));
        assert!(interlock::reserve(world, path, train, false));
    })
    .await?;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let still_reserved = live
        .call(move |world| world.paths.get(path).is_some_and(|p| p.is_reserved()))
        .await?;
    assert!(still_reserved, "stale timer released the new reservation");
    live.shutdown().await?;
    Ok(())
}

// -- kernel fault propagation (scenario 6) ------------------------------------

/// Fake command station: answers the version handshake, then dies when told.
async fn fake_device(listener: TcpListener, die_after_handshake: bool) {
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    let mut framed = Framed::new(stream, CanAsciiCodec::default());
    while let Some(Ok(frame)) = framed.next().await {
        if frame.opcode() == Some(opcode::REQUEST_VERSION) {
            let _ = framed.send(CanFrame::new(0x70, &[opcode::VERSION_REPLY, 0, 4, 2])).await;
            if die_after_handshake {
                // Drop the connection mid-stream.
                return;
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn kernel_fault_marks_the_interface_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(fake_device(listener, true));

    let live = LiveWorld::start(World::new())?;
    live.call(move |world| {
        add_interface(
            world,
            Interface::new("iface", IoConfig::Tcp { host: "127.0.0.1".into(), port }),
        );
        assert!(set_online(world, "iface", true));
    })
    .await?;

    // Handshake succeeds: Online.
    let online = wait_for(
        &live,
        |world| world.interfaces.get("iface").is_some_and(|i| i.state == InterfaceState::Online),
        TIMEOUT,
    )
    .await;
    assert!(online, "interface never came online");

    // The device dropped the connection: Error, and sends start failing.
    let errored = wait_for(
        &live,
        |world| world.interfaces.get("iface").is_some_and(|i| i.state == InterfaceState::Error),
        TIMEOUT,
    )
    .await;
    assert!(errored, "interface never entered the error state");

    let send_result = live
        .call(|world| {
            world
                .interfaces
                .get("iface")
                .and_then(|i| i.kernel.as_ref())
                .map(|k| k.track_on())
        })
        .await?;
    assert!(
        send_result.is_none() || send_result == Some(false),
        "sends must fail after the fault"
    );

    // stop completes, and a fresh start succeeds against a new device.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port2 = listener.local_addr()?.port();
    tokio::spawn(fake_device(listener, false));
    live.call(move |world| {
        assert!(set_online(world, "iface", false));
        if let Some(interface) = world.interfaces.get_mut("iface") {
            interface.io_config = IoConfig::Tcp { host: "127.0.0.1".into(), port: port2 };
        }
        assert!(set_online(world, "iface", true));
    })
    .await?;
    let online_again = wait_for(
        &live,
        |world| world.interfaces.get("iface").is_some_and(|i| i.state == InterfaceState::Online),
        TIMEOUT,
    )
    .await;
    assert!(online_again, "fresh kernel failed to start");

    live.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_device_trips_the_keep_alive() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    // Answers the handshake, then never says another word.
    tokio::spawn(fake_device(listener, false));

    let live = LiveWorld::start(World::new())?;
    live.call(move |world| {
        let mut interface =
            Interface::new("iface", IoConfig::Tcp { host: "127.0.0.1".into(), port });
        interface.kernel_config.keep_alive = Duration::from_millis(300);
        add_interface(world, interface);
        assert!(set_online(world, "iface", true));
    })
    .await?;

    let online = wait_for(
        &live,
        |world| world.interfaces.get("iface").is_some_and(|i| i.state == InterfaceState::Online),
        TIMEOUT,
    )
    .await;
    assert!(online, "interface never came online");

    let errored = wait_for(
        &live,
        |world| world.interfaces.get("iface").is_some_and(|i| i.state == InterfaceState::Error),
        TIMEOUT,
    )
    .await;
    assert!(errored, "keep-alive never expired");

    live.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn simulation_io_handler_handshakes_in_process() -> anyhow::Result<()> {
    let live = LiveWorld::start(World::new())?;
    live.call(|world| {
        add_interface(world, Interface::new("sim", IoConfig::Simulation));
        assert!(set_online(world, "sim", true));
    })
    .await?;

    let online = wait_for(
        &live,
        |world| world.interfaces.get("sim").is_some_and(|i| i.state == InterfaceState::Online),
        TIMEOUT,
    )
    .await;
    assert!(online, "simulation interface never came online");

    // Power on flows through to the kernel without error.
    live.call(|world| world.set_power(true)).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let still_online = live
        .call(|world| {
            world.interfaces.get("sim").is_some_and(|i| i.state == InterfaceState::Online)
        })
        .await?;
    assert!(still_online);

    live.shutdown().await?;
    Ok(())
}

// -- simulator ---------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn simulator_discovery_and_power_echo() -> anyhow::Result<()> {
    use signalboxsim::engine::Engine;
    use signalboxsim::protocol::{Message, SimCodec, DISCOVERY_REQUEST};
    use signalboxsim::server::{Server, ServerConfig};
    use signalboxsim::world::Layout;

    // Pick a free UDP port for discovery by binding then rebinding.
    let probe = UdpSocket::bind("127.0.0.1:0").await?;
    let discovery_port = probe.local_addr()?.port();
    drop(probe);

    let server = Server::start(
        Engine::new(Layout::default()),
        ServerConfig { discoverable: true, discovery_port, ..ServerConfig::default() },
    )
    .await?;

    // UDP discovery: "sim?" -> "sim!" + TCP port big-endian.
    let client = UdpSocket::bind("127.0.0.1:0").await?;
    client.send_to(DISCOVERY_REQUEST, ("127.0.0.1", discovery_port)).await?;
    let mut buf = [0u8; 16];
    let (len, _) = tokio::time::timeout(TIMEOUT, client.recv_from(&mut buf)).await??;
    assert_eq!(len, 6);
    assert_eq!(&buf[..4], b"sim!");
    let tcp_port = u16::from_be_bytes([buf[4], buf[5]]);
    assert_eq!(tcp_port, server.port());

    // TCP: power on is applied and echoed to the peer connection.
    let a = tokio::net::TcpStream::connect(("127.0.0.1", tcp_port)).await?;
    let b = tokio::net::TcpStream::connect(("127.0.0.1", tcp_port)).await?;
    let mut framed_a = Framed::new(a, SimCodec);
    let mut framed_b = Framed::new(b, SimCodec);

    // Give the accept loop a moment to register both peers.
    tokio::time::sleep(Duration::from_millis(100)).await;
    framed_a.send(Message::Power { on: true }).await?;
    let echoed = tokio::time::timeout(TIMEOUT, framed_b.next()).await?;
    assert!(
        matches!(echoed, Some(Ok(Message::Power { on: true }))),
        "peer never saw the power echo: {echoed:?}"
    );
    assert!(server.engine().lock().power_on());

    server.stop();
    Ok(())
}
