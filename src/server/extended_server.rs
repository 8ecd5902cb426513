use super::probe_stream;
use crate::{
    share::{bufs_to_utf16_str, Framing, Transport},
    Conf, ProbeErr, RequestType, ServerStatus,
};
use std::time::Duration;

const PING_HOST_CHANNEL: &str = "MC|PingHost";
/// Protocol number of 1.6.2, what vanilla 1.6 clients announce.
const PING_PROTOCOL_VERSION: u8 = 74;
const KICK_PACKET_ID: u8 = 0xFF;

/// Build the 1.6 ping: `FE 01`, then a `MC|PingHost` plugin message.
pub fn build_extended_request(conf: &Conf) -> Vec<u8> {
    let mut packet = Vec::<u8>::new();
    let channel = encode_utf16(PING_HOST_CHANNEL);
    let host = encode_utf16(&conf.host);
    let host_chars = (host.len() / 2) as u16;

    packet.extend_from_slice(&[0xFE, 0x01, 0xFA]);
    packet.extend_from_slice(&((channel.len() / 2) as u16).to_be_bytes());
    packet.extend_from_slice(&channel);
    // Remaining data: protocol byte, host length, host, port.
    packet.extend_from_slice(&(7 + host.len() as u16).to_be_bytes());
    packet.push(PING_PROTOCOL_VERSION);
    packet.extend_from_slice(&host_chars.to_be_bytes());
    packet.extend_from_slice(&host);
    packet.extend_from_slice(&(conf.port as i32).to_be_bytes());

    packet
}

fn encode_utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|x| x.to_be_bytes()).collect()
}

/// Server [1.6](https://wiki.vg/Server_List_Ping#1.6)
pub fn get_extended_server_status<T: Transport>(
    conf: &Conf,
    transport: &T,
    timeout: Duration,
) -> ServerStatus {
    probe_stream(
        RequestType::Extended,
        conf,
        transport,
        timeout,
        &build_extended_request(conf),
        Framing::Kick,
        process_extended_server_bufs,
    )
}

pub fn process_extended_server_bufs(bufs: &[u8]) -> Result<ServerStatus, ProbeErr> {
    if bufs.len() <= 3 || bufs[3..].len() % 2 != 0 {
        return Err(ProbeErr::DataErr(format!(
            "Server response data len invalid, len: {}",
            bufs.len()
        )));
    }

    if bufs[0] != KICK_PACKET_ID {
        return Err(ProbeErr::DataErr(format!(
            "Server response data is invalid, it should start with: 0xFF, but got: 0x{:02X}",
            bufs[0]
        )));
    }

    let res_str = bufs_to_utf16_str(&bufs[3..])?;

    // The payload begins with two characters: §1
    if !res_str.starts_with("§1") {
        return Err(ProbeErr::DataErr(format!(
            "Server response info must start with: §1, but got: {}",
            res_str.chars().take(2).collect::<String>()
        )));
    }

    let res_split_with_delimiter = res_str.split('\0').skip(1).collect::<Vec<_>>();

    // 1.Protocol version (e.g. 74)
    // 2.Minecraft server version (e.g. 1.6.2)
    // 3.Message of the day
    // 4.Current player count
    // 5.Max players
    if res_split_with_delimiter.len() < 5 {
        return Err(ProbeErr::DataErr(format!(
            "Server response info len is invalid, it must be at least 5, but got {}",
            res_split_with_delimiter.len()
        )));
    }

    let mut status = ServerStatus::success(
        RequestType::Extended,
        res_split_with_delimiter[1].into(),
        res_split_with_delimiter[2].into(),
        res_split_with_delimiter[3].into(),
        res_split_with_delimiter[4].into(),
    );

    status.protocol = res_split_with_delimiter[0].parse().ok();

    Ok(status)
}
