use super::probe_stream;
use crate::{
    share::{bufs_to_latin1_str, Framing, Transport},
    Conf, ProbeErr, RequestType, ServerStatus,
};
use std::time::Duration;

/// A NUL char in UTF-16BE plus the high byte of the next ASCII char.
const FIELD_DELIMITER: &str = "\0\0\0";
const MIN_FIELDS: usize = 6;

pub fn build_legacy_request() -> Vec<u8> {
    vec![0xFE, 0x01]
}

/// Server [1.4 to 1.5](https://wiki.vg/Server_List_Ping#1.4_to_1.5)
pub fn get_legacy_server_status<T: Transport>(
    conf: &Conf,
    transport: &T,
    timeout: Duration,
) -> ServerStatus {
    probe_stream(
        RequestType::Legacy,
        conf,
        transport,
        timeout,
        &build_legacy_request(),
        Framing::Kick,
        process_legacy_server_bufs,
    )
}

/// Parse the reply by splitting the raw bytes on NUL triples.
///
/// The reply is a kick packet carrying `§1\0protocol\0version\0motd\0online\0max`
/// as UTF-16BE. Read byte-wise, each separator and the high byte of the
/// following character form three NULs, so the fields are parts 1 to 5
/// and part 0 is the packet header.
pub fn process_legacy_server_bufs(bufs: &[u8]) -> Result<ServerStatus, ProbeErr> {
    if bufs.is_empty() {
        return Err(ProbeErr::DataErr("Empty response".into()));
    }

    let server_info = bufs_to_latin1_str(bufs);
    let server_info_split = server_info
        .split(FIELD_DELIMITER)
        .map(|field| field.replace('\0', ""))
        .collect::<Vec<_>>();

    // 1.Protocol version (e.g. 47)
    // 2.Minecraft server version (e.g. 1.4.2)
    // 3.Message of the day (e.g. A Minecraft Server)
    // 4.Current player count
    // 5.Max players
    if server_info_split.len() < MIN_FIELDS {
        return Err(ProbeErr::DataErr(format!(
            "Expected at least {} parts of server information, but got {}",
            MIN_FIELDS,
            server_info_split.len()
        )));
    }

    let mut status = ServerStatus::success(
        RequestType::Legacy,
        server_info_split[2].clone(),
        server_info_split[3].clone(),
        server_info_split[4].clone(),
        server_info_split[5].clone(),
    );

    status.protocol = server_info_split[1].trim().parse().ok();

    Ok(status)
}
