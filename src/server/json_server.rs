use super::probe_stream;
use crate::{
    share::{BufReader, Framing, Transport},
    varint::{encode_varint, read_varint},
    Conf, ProbeErr, RequestType, ServerStatus,
};
use serde::Deserialize;
use std::time::Duration;

const STATUS_RESPONSE_ID: i32 = 0x00;

/// Status payload, only the parts we report.
///
/// Servers and proxies add all sorts of extra fields, so unknown ones are
/// ignored rather than rejected.
#[derive(Deserialize, Debug)]
pub struct StatusResponse {
    pub version: Version,
    #[serde(default)]
    pub players: Players,
    #[serde(default)]
    pub description: Description,
    pub favicon: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Version {
    pub name: String,
    pub protocol: i32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Players {
    pub max: i64,
    pub online: i64,
}

/// Either a bare string or a [chat component](https://wiki.vg/Chat).
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Component(ChatComponent),
}

impl Default for Description {
    fn default() -> Self {
        Description::Text(String::new())
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ChatComponent {
    pub text: String,
    pub extra: Vec<Description>,
}

impl Description {
    /// Concatenated text of the component tree, in reading order.
    pub fn to_plain(&self) -> String {
        let mut out = String::new();

        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Description::Text(text) => out.push_str(text),
            Description::Component(component) => {
                out.push_str(&component.text);

                for extra in &component.extra {
                    extra.push_text(out);
                }
            }
        }
    }
}

/// Build handshake packet buffer.
fn build_handshake_packet(conf: &Conf) -> Vec<u8> {
    let mut packet = Vec::<u8>::new();
    let mut packet_data = Vec::<u8>::new();
    let server_addr_bytes = conf.host.as_bytes();

    // If the client is pinging to determine what version to use,
    // by convention -1 should be set.
    packet_data.append(&mut encode_varint(-1));
    // UTF-8 string prefixed with its size in bytes as a VarInt.
    packet_data.append(&mut encode_varint(server_addr_bytes.len() as i32));
    packet_data.extend_from_slice(server_addr_bytes);
    packet_data.extend_from_slice(&conf.port.to_be_bytes());
    // Next state, 1 for status.
    packet_data.append(&mut encode_varint(1));

    // Build [packet](https://wiki.vg/Protocol#Packet_format)
    packet.append(&mut encode_varint(1 + packet_data.len() as i32));
    packet.append(&mut encode_varint(0x00));
    packet.append(&mut packet_data);

    packet
}

/// Build status request packet buffer.
fn build_status_request_packet() -> Vec<u8> {
    let mut packet = Vec::<u8>::new();

    packet.append(&mut encode_varint(1));
    packet.append(&mut encode_varint(0x00));

    packet
}

/// Handshake immediately followed by the status request.
pub fn build_json_request(conf: &Conf) -> Vec<u8> {
    [build_handshake_packet(conf), build_status_request_packet()].concat()
}

/// Server [1.7 and above](https://wiki.vg/Server_List_Ping#Current_.281.7.2B.29)
pub fn get_json_server_status<T: Transport>(
    conf: &Conf,
    transport: &T,
    timeout: Duration,
) -> ServerStatus {
    probe_stream(
        RequestType::Json,
        conf,
        transport,
        timeout,
        &build_json_request(conf),
        Framing::VarIntPrefixed,
        process_json_server_bufs,
    )
}

pub fn process_json_server_bufs(bufs: &[u8]) -> Result<ServerStatus, ProbeErr> {
    let mut reader = BufReader::create(bufs);
    let _packet_len = read_varint(&mut reader)?;
    let packet_id = read_varint(&mut reader)?;

    if packet_id != STATUS_RESPONSE_ID {
        return Err(ProbeErr::DataErr(format!(
            "Expected status response packet 0x00, but got: 0x{:02X}",
            packet_id
        )));
    }

    let data_len = read_varint(&mut reader)?;
    let data_len = usize::try_from(data_len)
        .map_err(|_| ProbeErr::DataErr(format!("Negative string length: {}", data_len)))?;
    let data = reader.read_bufs(data_len)?;
    let json = std::str::from_utf8(data)
        .map_err(|err| ProbeErr::DataErr(format!("Status is not UTF-8: {}", err)))?;
    let response = serde_json::from_str::<StatusResponse>(json)?;

    let mut status = ServerStatus::success(
        RequestType::Json,
        response.version.name,
        response.description.to_plain(),
        response.players.online.to_string(),
        response.players.max.to_string(),
    );

    status.protocol = Some(response.version.protocol);
    status.favicon = response.favicon;

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{server::fixtures::*, ConnectionStatus};

    #[test]
    fn request_layout() {
        let conf = Conf::create_with_port("localhost", 25565).unwrap();
        let packet = build_json_request(&conf);

        assert_eq!(
            packet,
            [
                vec![0x13, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x09],
                b"localhost".to_vec(),
                vec![0x63, 0xDD, 0x01, 0x01, 0x00],
            ]
            .concat()
        );
    }

    #[test]
    fn parses_plain_description() {
        let bufs = json_response(
            r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":100,"online":7,"sample":[]},"description":"Hello","favicon":"data:image/png;base64,AAAA","enforcesSecureChat":true}"#,
        );
        let status = process_json_server_bufs(&bufs).unwrap();

        assert!(status.online);
        assert_eq!(status.version.as_deref(), Some("1.20.4"));
        assert_eq!(status.motd.as_deref(), Some("Hello"));
        assert_eq!(status.current_players.as_deref(), Some("7"));
        assert_eq!(status.max_players.as_deref(), Some("100"));
        assert_eq!(status.protocol, Some(765));
        assert_eq!(status.favicon.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(status.request_type, Some(RequestType::Json));
    }

    #[test]
    fn flattens_chat_component() {
        let bufs = json_response(
            r#"{"version":{"name":"Paper 1.19","protocol":759},"players":{"max":20,"online":0},"description":{"text":"A ","extra":[{"text":"Paper","color":"gold","extra":[" server"]},"!"]}}"#,
        );
        let status = process_json_server_bufs(&bufs).unwrap();

        assert_eq!(status.motd.as_deref(), Some("A Paper server!"));
        assert!(status.favicon.is_none());
    }

    #[test]
    fn missing_players_default_to_zero() {
        let bufs = json_response(r#"{"version":{"name":"1.8","protocol":47},"description":""}"#);
        let status = process_json_server_bufs(&bufs).unwrap();

        assert_eq!(status.online_players(), Some(0));
        assert_eq!(status.max_players_count(), Some(0));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = process_json_server_bufs(&json_response("{not json")).unwrap_err();

        assert!(matches!(err, ProbeErr::Json(_)));
        assert_eq!(err.status(), ConnectionStatus::Unknown);
    }

    #[test]
    fn truncated_or_foreign_packets_are_malformed() {
        let mut bufs = json_response(r#"{"version":{"name":"1.8","protocol":47}}"#);

        bufs.truncate(bufs.len() - 3);
        assert!(matches!(
            process_json_server_bufs(&bufs),
            Err(ProbeErr::DataErr(_))
        ));
        assert!(process_json_server_bufs(&legacy_response("47", "1.4.7", "m", "0", "1")).is_err());
    }
}
