use super::probe_stream;
use crate::{
    share::{bufs_to_latin1_str, Framing, Transport},
    Conf, ProbeErr, RequestType, ServerStatus,
};
use std::time::Duration;

/// Beta servers never report their exact version.
pub const BETA_VERSION: &str = "≥1.8b/1.3";

const KICK_PACKET_ID: u8 = 0xFF;
/// Payload starts after the id, the u16 length and the first high byte.
const PAYLOAD_OFFSET: usize = 4;
const FIELD_SEPARATOR: char = '\u{A7}';
const MIN_FIELDS: usize = 3;

pub fn build_beta_request() -> Vec<u8> {
    vec![0xFE]
}

/// Server [beta 1.8 to 1.3](https://wiki.vg/Server_List_Ping#Beta_1.8_to_1.3).
///
/// The reply is a kick packet whose reason reads `motd§online§max`.
pub fn get_beta_server_status<T: Transport>(
    conf: &Conf,
    transport: &T,
    timeout: Duration,
) -> ServerStatus {
    probe_stream(
        RequestType::Beta,
        conf,
        transport,
        timeout,
        &build_beta_request(),
        Framing::Kick,
        process_beta_server_bufs,
    )
}

pub fn process_beta_server_bufs(bufs: &[u8]) -> Result<ServerStatus, ProbeErr> {
    match bufs.first() {
        Some(&KICK_PACKET_ID) => {}
        Some(first_buf) => {
            return Err(ProbeErr::DataErr(format!(
                "Packet response expected to start with: 0xFF, but got: 0x{:02X}",
                first_buf
            )));
        }
        None => return Err(ProbeErr::DataErr("Empty response".into())),
    }

    // `§` is a single byte here; a multi-byte decoding would mangle it.
    let server_info = bufs_to_latin1_str(bufs.get(PAYLOAD_OFFSET..).unwrap_or_default());
    let server_info_split = server_info
        .split(FIELD_SEPARATOR)
        .map(|field| field.replace('\0', ""))
        .collect::<Vec<_>>();

    if server_info_split.len() < MIN_FIELDS {
        return Err(ProbeErr::DataErr(format!(
            "Expected at least {} parts of server information, but got {}",
            MIN_FIELDS,
            server_info_split.len()
        )));
    }

    let mut fields = server_info_split.into_iter();
    let (motd, current_players, max_players) = match (fields.next(), fields.next(), fields.next())
    {
        (Some(motd), Some(current), Some(max)) => (motd, current, max),
        _ => return Err(ProbeErr::DataErr("Missing server information".into())),
    };

    Ok(ServerStatus::success(
        RequestType::Beta,
        BETA_VERSION.into(),
        motd,
        current_players,
        max_players,
    ))
}
