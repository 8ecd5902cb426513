use super::report;
use crate::{
    share::{get_current_millis, BufReader, Transport},
    Conf, ProbeErr, RequestType, ServerStatus,
};
use std::time::Duration;
use tracing::debug;

/// RakNet offline message magic.
pub const MAGIC_BYTES: &[u8] = &[
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

const UNCONNECTED_PING_ID: u8 = 0x01;
const UNCONNECTED_PONG_ID: u8 = 0x1C;
const MIN_FIELDS: usize = 6;

/// Build an [unconnected ping](https://wiki.vg/Raknet_Protocol#Unconnected_Ping).
pub fn build_bedrock_request(time: u64, client_guid: u64) -> Vec<u8> {
    [
        &[UNCONNECTED_PING_ID][..],
        time.to_be_bytes().as_slice(),
        MAGIC_BYTES,
        client_guid.to_be_bytes().as_slice(),
    ]
    .concat()
}

/// Bedrock and Pocket Edition servers, over RakNet.
///
/// The server id string of the pong reads
/// `edition;motd;protocol;version;online;max;server_id;motd2;gamemode;...`.
pub fn get_bedrock_server_status<T: Transport>(
    conf: &Conf,
    transport: &T,
    timeout: Duration,
) -> ServerStatus {
    let time = get_current_millis();
    let client_guid = time ^ ((std::process::id() as u64) << 32);
    let packet = build_bedrock_request(time, client_guid);

    debug!(%conf, "sending unconnected ping");

    match transport.exchange_datagram(conf, timeout, &packet) {
        Ok(exchange) => report(
            RequestType::Bedrock,
            Some(exchange.latency),
            process_bedrock_server_bufs(&exchange.bufs),
        ),
        Err(err) => report(RequestType::Bedrock, None, Err(err)),
    }
}

pub fn process_bedrock_server_bufs(bufs: &[u8]) -> Result<ServerStatus, ProbeErr> {
    let mut reader = BufReader::create(bufs);

    match reader.read()? {
        UNCONNECTED_PONG_ID => {}
        first_buf => {
            return Err(ProbeErr::DataErr(format!(
                "Packet response expected to start with: 0x1C, but got: 0x{:02X}",
                first_buf
            )));
        }
    }

    // Echoed time and server GUID.
    reader.set_current_idx_forward(16)?;

    if reader.read_bufs(MAGIC_BYTES.len())? != MAGIC_BYTES {
        return Err(ProbeErr::DataErr("Offline message magic mismatch".into()));
    }

    let server_info_len = reader.read_u16()? as usize;
    let server_info_buf = reader.read_bufs(server_info_len)?;
    let server_info = String::from_utf8_lossy(server_info_buf);
    let server_info_split = server_info.split(';').collect::<Vec<_>>();

    if server_info_split.len() < MIN_FIELDS {
        return Err(ProbeErr::DataErr(format!(
            "Expected at least {} parts of server information, but got {}",
            MIN_FIELDS,
            server_info_split.len()
        )));
    }

    let mut status = ServerStatus::success(
        RequestType::Bedrock,
        server_info_split[3].into(),
        server_info_split[1].into(),
        server_info_split[4].into(),
        server_info_split[5].into(),
    );

    status.protocol = server_info_split[2].parse().ok();
    status.gamemode = server_info_split
        .get(8)
        .filter(|gamemode| !gamemode.is_empty())
        .map(|&gamemode| gamemode.into());

    Ok(status)
}
