use crate::{conf::Conf, varint::decode_varint, ProbeErr};
use std::{
    io::{ErrorKind, Read, Write},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

/// Largest datagram we expect back from a Bedrock server.
const DATAGRAM_BUF_SIZE: usize = 4096;
const READ_CHUNK_SIZE: usize = 4096;
/// Upper bound on a stream reply, favicons included.
pub const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// Raw reply of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Everything the server sent back.
    pub bufs: Vec<u8>,
    /// Milliseconds spent establishing the connection.
    pub latency: u64,
}

/// How a stream reply is delimited, so reading can stop before the peer
/// closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Pre-netty kick packet: `0xFF`, u16 length in chars, UTF-16BE payload.
    Kick,
    /// Netty packet: VarInt length followed by that many bytes.
    VarIntPrefixed,
}

impl Framing {
    /// Whether `bufs` already holds a whole reply.
    pub fn is_complete(&self, bufs: &[u8]) -> bool {
        match self {
            Framing::Kick => match bufs {
                [] => false,
                // Not a kick packet, waiting will not make it one.
                [first, ..] if *first != 0xFF => true,
                [_, hi, lo, rest @ ..] => {
                    rest.len() >= u16::from_be_bytes([*hi, *lo]) as usize * 2
                }
                _ => false,
            },
            Framing::VarIntPrefixed => {
                let prefix_len = match bufs.iter().position(|&b| b & 0x80 == 0) {
                    Some(idx) => idx + 1,
                    None => return bufs.len() >= 5,
                };

                match decode_varint(&bufs[..prefix_len]) {
                    Ok(len) if len >= 0 => bufs.len() >= prefix_len + len as usize,
                    _ => true,
                }
            }
        }
    }
}

/// Socket primitives the codecs are written against.
///
/// Every call owns its socket for exactly its own duration: the connection
/// is released before the call returns, whatever the outcome.
pub trait Transport {
    /// Connect over TCP, send `request`, collect the reply.
    ///
    /// Reading stops once `framing` reports a whole reply, the peer closes,
    /// or `timeout` (counted from the start of the connection attempt) runs
    /// out. Bytes received before the timeout are still returned.
    fn exchange(
        &self,
        conf: &Conf,
        timeout: Duration,
        request: &[u8],
        framing: Framing,
    ) -> Result<Exchange, ProbeErr>;

    /// Send `request` as one UDP datagram and return the first reply.
    fn exchange_datagram(
        &self,
        conf: &Conf,
        timeout: Duration,
        request: &[u8],
    ) -> Result<Exchange, ProbeErr>;
}

/// [Transport] over `std::net` sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetTransport;

impl Transport for NetTransport {
    fn exchange(
        &self,
        conf: &Conf,
        timeout: Duration,
        request: &[u8],
        framing: Framing,
    ) -> Result<Exchange, ProbeErr> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut socket = create_tcp_socket(conf, deadline)?;
        let latency = started.elapsed().as_millis() as u64;

        debug!(%conf, latency, "connected");

        let remaining = remaining_until(deadline)?;

        socket
            .set_write_timeout(Some(remaining))
            .map_err(ProbeErr::Io)?;
        socket.write_all(request).map_err(classify_io_err)?;

        let bufs = read_response(&mut socket, deadline, framing)?;

        debug!(%conf, len = bufs.len(), "received response");

        Ok(Exchange { bufs, latency })
    }

    fn exchange_datagram(
        &self,
        conf: &Conf,
        timeout: Duration,
        request: &[u8],
    ) -> Result<Exchange, ProbeErr> {
        if timeout.is_zero() {
            return Err(ProbeErr::Timeout);
        }

        let started = Instant::now();
        let addr = resolve(conf)?
            .next()
            .ok_or_else(|| no_address_err(conf))?;
        let socket = create_udp_socket(&addr)?;

        socket.set_read_timeout(Some(timeout)).map_err(ProbeErr::Io)?;
        socket.set_write_timeout(Some(timeout)).map_err(ProbeErr::Io)?;
        socket.send(request).map_err(classify_datagram_err)?;

        let mut bufs = vec![0u8; DATAGRAM_BUF_SIZE];
        let len = socket.recv(&mut bufs).map_err(classify_datagram_err)?;
        let latency = started.elapsed().as_millis() as u64;

        bufs.truncate(len);
        debug!(%conf, latency, len, "received datagram");

        Ok(Exchange { bufs, latency })
    }
}

fn resolve(conf: &Conf) -> Result<std::vec::IntoIter<SocketAddr>, ProbeErr> {
    conf.to_socket_addrs().map_err(ProbeErr::ConnectionFailed)
}

fn no_address_err(conf: &Conf) -> ProbeErr {
    ProbeErr::ConnectionFailed(std::io::Error::new(
        ErrorKind::NotFound,
        format!("{} did not resolve to any address", conf.host),
    ))
}

fn remaining_until(deadline: Instant) -> Result<Duration, ProbeErr> {
    match deadline.saturating_duration_since(Instant::now()) {
        remaining if remaining.is_zero() => Err(ProbeErr::Timeout),
        remaining => Ok(remaining),
    }
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

fn classify_io_err(err: std::io::Error) -> ProbeErr {
    if is_timeout(err.kind()) {
        ProbeErr::Timeout
    } else {
        ProbeErr::Io(err)
    }
}

fn classify_datagram_err(err: std::io::Error) -> ProbeErr {
    match err.kind() {
        kind if is_timeout(kind) => ProbeErr::Timeout,
        // ICMP port unreachable surfaces on the next call of a connected socket.
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            ProbeErr::ConnectionFailed(err)
        }
        _ => ProbeErr::Io(err),
    }
}

/// Connect to the first address of `conf` that accepts before `deadline`.
pub fn create_tcp_socket(conf: &Conf, deadline: Instant) -> Result<TcpStream, ProbeErr> {
    let mut last_err = None;

    for addr in resolve(conf)? {
        let remaining = remaining_until(deadline)?;

        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(socket) => return Ok(socket),
            Err(err) => {
                debug!(%addr, %err, "connect failed");
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) if is_timeout(err.kind()) => Err(ProbeErr::Timeout),
        Some(err) => Err(ProbeErr::ConnectionFailed(err)),
        None => Err(no_address_err(conf)),
    }
}

/// Bind an ephemeral UDP socket and connect it to `addr`.
pub fn create_udp_socket(addr: &SocketAddr) -> Result<UdpSocket, ProbeErr> {
    let local: SocketAddr = match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).map_err(ProbeErr::Io)?;

    socket.connect(addr).map_err(ProbeErr::ConnectionFailed)?;

    Ok(socket)
}

fn read_response(
    socket: &mut TcpStream,
    deadline: Instant,
    framing: Framing,
) -> Result<Vec<u8>, ProbeErr> {
    let mut bufs = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    while !framing.is_complete(&bufs) {
        let remaining = match remaining_until(deadline) {
            Ok(remaining) => remaining,
            Err(err) => return partial_or(bufs, err),
        };

        socket
            .set_read_timeout(Some(remaining))
            .map_err(ProbeErr::Io)?;

        match socket.read(&mut chunk) {
            // Closing without a word is how old servers ignore a probe.
            Ok(0) if bufs.is_empty() => return Err(ProbeErr::Timeout),
            Ok(0) => break,
            Ok(len) if bufs.len() + len > MAX_RESPONSE_SIZE => {
                return Err(ProbeErr::DataErr(format!(
                    "Response exceeds {} bytes",
                    MAX_RESPONSE_SIZE
                )));
            }
            Ok(len) => bufs.extend_from_slice(&chunk[..len]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return partial_or(bufs, classify_io_err(err)),
        }
    }

    Ok(bufs)
}

/// Keep what already arrived, the codec decides whether it is enough.
fn partial_or(bufs: Vec<u8>, err: ProbeErr) -> Result<Vec<u8>, ProbeErr> {
    if bufs.is_empty() {
        Err(err)
    } else {
        Ok(bufs)
    }
}

/// Milliseconds since the unix epoch, 0 if the clock is before it.
pub fn get_current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|t| t.as_millis() as u64)
        .unwrap_or_default()
}

/// Decode one byte per char (ISO-8859-1), so `0xA7` stays `§`.
pub fn bufs_to_latin1_str(bufs: &[u8]) -> String {
    bufs.iter().map(|&b| b as char).collect()
}

pub fn bufs_to_utf16_str(bufs: &[u8]) -> Result<String, ProbeErr> {
    if bufs.len() % 2 != 0 {
        return Err(ProbeErr::DataErr(format!(
            "Conversion from UTF-16 to string failed. Expected length to be even, but got: {}",
            bufs.len()
        )));
    }

    String::from_utf16(
        bufs.chunks(2)
            .map(|x| u16::from_be_bytes([x[0], x[1]]))
            .collect::<Vec<_>>()
            .as_slice(),
    )
    .map_err(|err| ProbeErr::DataErr(format!("Can not parse response as UTF-16: {}", err)))
}

/// Cursor over a received buffer.
pub struct BufReader<'a> {
    bufs: &'a [u8],
    current_idx: usize,
}

impl<'a> BufReader<'a> {
    pub fn create(bufs: &'a [u8]) -> Self {
        Self {
            bufs,
            current_idx: 0,
        }
    }

    pub fn set_current_idx_forward(&mut self, idx: usize) -> Result<(), ProbeErr> {
        self.read_bufs(idx).map(|_| ())
    }

    pub fn read(&mut self) -> Result<u8, ProbeErr> {
        Ok(self.read_bufs(1)?[0])
    }

    pub fn read_bufs(&mut self, size: usize) -> Result<&'a [u8], ProbeErr> {
        let bufs: &'a [u8] = self.bufs;
        let end = self.current_idx + size;

        match bufs.get(self.current_idx..end) {
            Some(bufs) => {
                self.current_idx = end;
                Ok(bufs)
            }
            None => Err(ProbeErr::DataErr(format!(
                "Incomplete data: wanted {} bytes at offset {}, only {} available",
                size,
                self.current_idx,
                self.bufs.len().saturating_sub(self.current_idx)
            ))),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, ProbeErr> {
        let bufs = self.read_bufs(2)?;

        Ok(u16::from_be_bytes([bufs[0], bufs[1]]))
    }
}
