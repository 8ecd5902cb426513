use crate::StatErr;
use serde::Serialize;

/// Outcome of a query, exactly one per attempt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Connected and the response parsed into a complete record.
    Success,
    /// Could not connect: unknown host, refused or unreachable.
    ConnectionFailed,
    /// No response within the configured window.
    Timeout,
    /// Connected, but the response did not match the expected framing.
    Unknown,
}

impl ConnectionStatus {
    /// How strongly the status says the server is not there.
    ///
    /// Used to pick the reported status once every codec has failed.
    pub(crate) fn severity(self) -> u8 {
        match self {
            ConnectionStatus::ConnectionFailed => 3,
            ConnectionStatus::Timeout => 2,
            ConnectionStatus::Unknown => 1,
            ConnectionStatus::Success => 0,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionStatus::Success => "Success",
            ConnectionStatus::ConnectionFailed => "ConnectionFailed",
            ConnectionStatus::Timeout => "Timeout",
            ConnectionStatus::Unknown => "Unknown",
        };

        write!(f, "{}", name)
    }
}

/// Server list ping generation to speak.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestType {
    /// Try every generation in turn.
    #[default]
    Auto,
    /// Server versions beta 1.8 to 1.3.
    Beta,
    /// Server versions 1.4 to 1.5.
    Legacy,
    /// Server version 1.6.
    Extended,
    /// Server versions 1.7 to latest.
    Json,
    /// Bedrock and Pocket Edition, over UDP.
    Bedrock,
}

impl std::str::FromStr for RequestType {
    type Err = StatErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "none" => Ok(RequestType::Auto),
            "beta" => Ok(RequestType::Beta),
            "legacy" => Ok(RequestType::Legacy),
            "extended" => Ok(RequestType::Extended),
            "json" => Ok(RequestType::Json),
            "bedrock" => Ok(RequestType::Bedrock),
            other => Err(StatErr::UnknownRequestType(other.into())),
        }
    }
}

/// Normalized server status, whichever protocol produced it.
///
/// Player counts are kept as the text the server sent. Use
/// [ServerStatus::online_players] and [ServerStatus::max_players_count]
/// for numbers; a misbehaving server may send something that is not one.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// Whether the server answered with a well-formed status.
    pub online: bool,
    /// Reported server version, or a range when the protocol has none.
    pub version: Option<String>,
    /// Message of the day, formatting codes kept.
    pub motd: Option<String>,
    /// Players currently online, as sent.
    pub current_players: Option<String>,
    /// Player capacity, as sent.
    pub max_players: Option<String>,
    /// Milliseconds spent establishing the connection.
    pub latency: Option<u64>,
    /// See [ConnectionStatus].
    pub connection_status: ConnectionStatus,
    /// Protocol number, for generations that report one.
    pub protocol: Option<i32>,
    /// Generation that produced this record.
    pub request_type: Option<RequestType>,
    /// Bedrock game mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamemode: Option<String>,
    /// Server icon as a base64 data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl ServerStatus {
    /// Record for an attempt that did not produce a status.
    pub fn failed(
        connection_status: ConnectionStatus,
        request_type: Option<RequestType>,
        latency: Option<u64>,
    ) -> Self {
        Self {
            online: false,
            version: None,
            motd: None,
            current_players: None,
            max_players: None,
            latency,
            connection_status,
            protocol: None,
            request_type,
            gamemode: None,
            favicon: None,
        }
    }

    /// Record for a successful attempt; the four core fields are mandatory.
    pub(crate) fn success(
        request_type: RequestType,
        version: String,
        motd: String,
        current_players: String,
        max_players: String,
    ) -> Self {
        Self {
            online: true,
            version: Some(version),
            motd: Some(motd),
            current_players: Some(current_players),
            max_players: Some(max_players),
            latency: None,
            connection_status: ConnectionStatus::Success,
            protocol: None,
            request_type: Some(request_type),
            gamemode: None,
            favicon: None,
        }
    }

    pub fn online_players(&self) -> Option<u32> {
        self.current_players.as_deref()?.trim().parse().ok()
    }

    pub fn max_players_count(&self) -> Option<u32> {
        self.max_players.as_deref()?.trim().parse().ok()
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_carries_no_fields() {
        let status = ServerStatus::failed(ConnectionStatus::ConnectionFailed, None, None);

        assert!(!status.online);
        assert!(status.version.is_none());
        assert!(status.motd.is_none());
        assert!(status.current_players.is_none());
        assert!(status.max_players.is_none());
    }

    #[test]
    fn player_counts_tolerate_garbage() {
        let status = ServerStatus::success(
            RequestType::Legacy,
            "1.4.7".into(),
            "hello".into(),
            " 12 ".into(),
            "lots".into(),
        );

        assert_eq!(status.online_players(), Some(12));
        assert_eq!(status.max_players_count(), None);
    }

    #[test]
    fn request_type_from_str() {
        assert_eq!("Legacy".parse::<RequestType>().unwrap(), RequestType::Legacy);
        assert_eq!("bedrock".parse::<RequestType>().unwrap(), RequestType::Bedrock);
        assert!("netty".parse::<RequestType>().is_err());
    }

    #[test]
    fn connection_failed_outranks_other_failures() {
        assert!(
            ConnectionStatus::ConnectionFailed.severity() > ConnectionStatus::Timeout.severity()
        );
        assert!(ConnectionStatus::Timeout.severity() > ConnectionStatus::Unknown.severity());
    }
}
