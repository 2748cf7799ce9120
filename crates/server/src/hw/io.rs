// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IO handlers: the transport variants a kernel can drive.
//!
//! A handler is connected once, then split into a write half and a read
//! half so the kernel can send and receive concurrently. Serial devices are
//! put into raw mode at the configured baud rate; the simulation variant is
//! an in-process device that answers the handshake.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

use crate::hw::frame::{opcode, CanAsciiCodec, CanFrame};
use futures_util::SinkExt;

/// Transport selection for an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IoConfig {
    Tcp { host: String, port: u16 },
    Serial { device: PathBuf, baud: u32 },
    Udp { host: String, port: u16 },
    Simulation,
}

pub trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

type BoxedStream = Box<dyn IoStream>;

/// In-process fake device: answers the handshake and acknowledges power
/// commands, so kernels run unchanged without hardware.
#[derive(Debug)]
struct SimDevice {
    reply_tx: mpsc::UnboundedSender<CanFrame>,
    can_id: u8,
}

impl SimDevice {
    fn handle(&self, frame: &CanFrame) {
        let reply = match frame.opcode() {
            Some(opcode::REQUEST_VERSION) => {
                Some(CanFrame::new(self.can_id, &[opcode::VERSION_REPLY, 0, 4, 2]))
            }
            Some(opcode::TRACK_ON) => Some(CanFrame::new(self.can_id, &[opcode::TRACK_ON])),
            Some(opcode::TRACK_OFF) => Some(CanFrame::new(self.can_id, &[opcode::TRACK_OFF])),
            _ => None,
        };
        if let Some(reply) = reply {
            let _ = self.reply_tx.send(reply);
        }
    }
}

/// Write half of a transport.
pub enum IoTx {
    Stream(FramedWrite<WriteHalf<BoxedStream>, CanAsciiCodec>),
    Udp(Arc<UdpSocket>),
    Simulation(SimDeviceTx),
}

/// Send side of the in-process device.
pub struct SimDeviceTx {
    device: SimDevice,
}

/// Read half of a transport.
pub enum IoRx {
    Stream(FramedRead<ReadHalf<BoxedStream>, CanAsciiCodec>),
    Udp { socket: Arc<UdpSocket>, codec: CanAsciiCodec, buf: Vec<u8> },
    Simulation(mpsc::UnboundedReceiver<CanFrame>),
}

/// A connected, not yet split transport.
pub struct IoHandler {
    tx: IoTx,
    rx: IoRx,
    simulation: bool,
}

impl std::fmt::Debug for IoHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoHandler").field("simulation", &self.simulation).finish()
    }
}

impl IoHandler {
    pub async fn connect(config: &IoConfig) -> anyhow::Result<Self> {
        match config {
            IoConfig::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                Ok(Self::from_stream(Box::new(stream)))
            }
            IoConfig::Serial { device, baud } => {
                let stream = open_serial(device, *baud)?;
                Ok(Self::from_stream(stream))
            }
            IoConfig::Udp { host, port } => {
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                socket.connect((host.as_str(), *port)).await?;
                let socket = Arc::new(socket);
                Ok(Self {
                    tx: IoTx::Udp(Arc::clone(&socket)),
                    rx: IoRx::Udp {
                        socket,
                        codec: CanAsciiCodec::default(),
                        buf: vec![0u8; 1500],
                    },
                    simulation: false,
                })
            }
            IoConfig::Simulation => {
                let (reply_tx, reply_rx) = mpsc::unbounded_channel();
                Ok(Self {
                    tx: IoTx::Simulation(SimDeviceTx {
                        device: SimDevice { reply_tx, can_id: 0x70 },
                    }),
                    rx: IoRx::Simulation(reply_rx),
                    simulation: true,
                })
            }
        }
    }

    fn from_stream(stream: BoxedStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            tx: IoTx::Stream(FramedWrite::new(write, CanAsciiCodec::default())),
            rx: IoRx::Stream(FramedRead::new(read, CanAsciiCodec::default())),
            simulation: false,
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    pub fn split(self) -> (IoTx, IoRx) {
        (self.tx, self.rx)
    }
}

impl IoTx {
    pub async fn send(&mut self, frame: CanFrame) -> anyhow::Result<()> {
        match self {
            Self::Stream(framed) => {
                framed.send(frame).await?;
                Ok(())
            }
            Self::Udp(socket) => {
                let mut codec = CanAsciiCodec::default();
                let mut out = bytes::BytesMut::new();
                codec.encode(frame, &mut out)?;
                socket.send(&out).await?;
                Ok(())
            }
            Self::Simulation(sim) => {
                sim.device.handle(&frame);
                Ok(())
            }
        }
    }
}

impl IoRx {
    /// Receive the next frame. `Ok(None)` means the transport closed.
    pub async fn recv(&mut self) -> anyhow::Result<Option<CanFrame>> {
        match self {
            Self::Stream(framed) => match framed.next().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => Err(e.into()),
                None => Ok(None),
            },
            Self::Udp { socket, codec, buf } => loop {
                let len = socket.recv(buf).await?;
                let mut bytes = bytes::BytesMut::from(&buf[..len]);
                if let Some(frame) = codec.decode(&mut bytes)? {
                    return Ok(Some(frame));
                }
            },
            Self::Simulation(rx) => Ok(rx.recv().await),
        }
    }

    /// Malformed bytes discarded since the last call.
    pub fn take_dropped(&mut self) -> usize {
        match self {
            Self::Stream(framed) => framed.decoder_mut().take_dropped(),
            Self::Udp { codec, .. } => codec.take_dropped(),
            Self::Simulation(_) => 0,
        }
    }
}

/// Open a serial device in raw mode at the given baud rate. The file is
/// opened twice (read/write halves) and joined back into one stream.
fn open_serial(device: &PathBuf, baud: u32) -> anyhow::Result<BoxedStream> {
    use nix::sys::termios::{self, SetArg};

    let file = std::fs::OpenOptions::new().read(true).write(true).open(device)?;

    let mut attrs = termios::tcgetattr(&file)?;
    termios::cfmakeraw(&mut attrs);
    termios::cfsetspeed(&mut attrs, baud_rate(baud)?)?;
    termios::tcsetattr(&file, SetArg::TCSANOW, &attrs)?;

    let reader = tokio::fs::File::from_std(file.try_clone()?);
    let writer = tokio::fs::File::from_std(file);
    Ok(Box::new(tokio::io::join(reader, writer)))
}

fn baud_rate(baud: u32) -> anyhow::Result<nix::sys::termios::BaudRate> {
    use nix::sys::termios::BaudRate;
    Ok(match baud {
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        other => anyhow::bail!("unsupported baud rate {other}"),
    })
}
