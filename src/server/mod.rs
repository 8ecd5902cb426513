mod bedrock_server;
mod beta_server;
mod extended_server;
mod json_server;
mod legacy_server;

use crate::{
    share::{Framing, Transport},
    Conf, ConnectionStatus, ProbeErr, RequestType, ServerStatus,
};
pub use bedrock_server::*;
pub use beta_server::*;
pub use extended_server::*;
pub use json_server::*;
pub use legacy_server::*;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Generations tried by auto-detect, in order.
pub const AUTO_DETECT_ORDER: [RequestType; 5] = [
    RequestType::Legacy,
    RequestType::Beta,
    RequestType::Extended,
    RequestType::Json,
    RequestType::Bedrock,
];

type Probe<T> = fn(&Conf, &T, Duration) -> ServerStatus;

fn codec_for<T: Transport>(request_type: RequestType) -> Option<Probe<T>> {
    match request_type {
        RequestType::Auto => None,
        RequestType::Beta => Some(get_beta_server_status::<T>),
        RequestType::Legacy => Some(get_legacy_server_status::<T>),
        RequestType::Extended => Some(get_extended_server_status::<T>),
        RequestType::Json => Some(get_json_server_status::<T>),
        RequestType::Bedrock => Some(get_bedrock_server_status::<T>),
    }
}

/// Run the query `conf` describes.
///
/// A specific [RequestType] is tried exactly once. [RequestType::Auto] walks
/// [AUTO_DETECT_ORDER] until a generation answers.
pub fn query<T: Transport>(conf: &Conf, transport: &T) -> ServerStatus {
    match codec_for::<T>(conf.request_type) {
        Some(probe) => attempt(conf, transport, conf.request_type, probe),
        None => auto_detect(conf, transport),
    }
}

/// Time budget of the next attempt, `None` once the deadline has passed.
fn attempt_timeout(conf: &Conf) -> Option<Duration> {
    match conf.deadline {
        None => Some(conf.timeout),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());

            (!remaining.is_zero()).then(|| remaining.min(conf.timeout))
        }
    }
}

fn attempt<T: Transport>(
    conf: &Conf,
    transport: &T,
    request_type: RequestType,
    probe: Probe<T>,
) -> ServerStatus {
    match attempt_timeout(conf) {
        Some(timeout) => {
            debug!(%conf, ?request_type, ?timeout, "probing");
            probe(conf, transport, timeout)
        }
        None => {
            debug!(%conf, ?request_type, "deadline passed, not probing");
            ServerStatus::failed(ConnectionStatus::Timeout, Some(request_type), None)
        }
    }
}

/// Whether `request_type` is still worth trying after `failures`.
///
/// A refused TCP connection rules out every other TCP generation, but says
/// nothing about the UDP based Bedrock ping.
fn should_attempt(request_type: RequestType, failures: &[ServerStatus]) -> bool {
    match request_type {
        RequestType::Bedrock => true,
        _ => !failures
            .iter()
            .any(|s| s.connection_status == ConnectionStatus::ConnectionFailed),
    }
}

fn auto_detect<T: Transport>(conf: &Conf, transport: &T) -> ServerStatus {
    let mut failures = Vec::<ServerStatus>::new();

    for request_type in AUTO_DETECT_ORDER {
        if conf.deadline.is_some() && attempt_timeout(conf).is_none() {
            failures.push(ServerStatus::failed(
                ConnectionStatus::Timeout,
                Some(request_type),
                None,
            ));
            break;
        }

        if !should_attempt(request_type, &failures) {
            debug!(%conf, ?request_type, "skipped, host refused connections");
            continue;
        }

        let status = match codec_for::<T>(request_type) {
            Some(probe) => attempt(conf, transport, request_type, probe),
            None => continue,
        };

        if status.online {
            return status;
        }

        failures.push(status);
    }

    exhausted(failures)
}

/// Pick the strongest negative signal among failed attempts; the latest wins ties.
fn exhausted(failures: Vec<ServerStatus>) -> ServerStatus {
    failures
        .into_iter()
        .max_by_key(|s| s.connection_status.severity())
        .unwrap_or_else(|| ServerStatus::failed(ConnectionStatus::Timeout, None, None))
}

/// Fill in latency on success, or turn the error into a failed record.
pub(crate) fn report(
    request_type: RequestType,
    latency: Option<u64>,
    result: Result<ServerStatus, ProbeErr>,
) -> ServerStatus {
    match result {
        Ok(mut status) => {
            status.latency = latency;
            status
        }
        Err(err) => {
            match &err {
                ProbeErr::DataErr(_) | ProbeErr::Json(_) => {
                    warn!(?request_type, %err, "unintelligible response")
                }
                _ => debug!(?request_type, %err, "probe failed"),
            }

            ServerStatus::failed(err.status(), Some(request_type), latency)
        }
    }
}

/// One TCP exchange followed by `process` on the reply.
pub(crate) fn probe_stream<T: Transport>(
    request_type: RequestType,
    conf: &Conf,
    transport: &T,
    timeout: Duration,
    request: &[u8],
    framing: Framing,
    process: fn(&[u8]) -> Result<ServerStatus, ProbeErr>,
) -> ServerStatus {
    match transport.exchange(conf, timeout, request, framing) {
        Ok(exchange) => report(
            request_type,
            Some(exchange.latency),
            process(&exchange.bufs),
        ),
        Err(err) => report(request_type, None, Err(err)),
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};
    use crate::share::Exchange;
    use std::{cell::RefCell, collections::VecDeque, io};

    /// Replays scripted replies and records which generation asked for each.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: RefCell<VecDeque<Result<Vec<u8>, ProbeErr>>>,
        asked: RefCell<Vec<RequestType>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<Result<Vec<u8>, ProbeErr>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                asked: RefCell::default(),
            }
        }

        fn reply(&self, request_type: RequestType) -> Result<Exchange, ProbeErr> {
            self.asked.borrow_mut().push(request_type);

            let bufs = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ProbeErr::Timeout))?;

            Ok(Exchange { bufs, latency: 3 })
        }

        fn asked(&self) -> Vec<RequestType> {
            self.asked.borrow().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn exchange(
            &self,
            _conf: &Conf,
            _timeout: Duration,
            request: &[u8],
            _framing: Framing,
        ) -> Result<Exchange, ProbeErr> {
            let request_type = match request {
                [0xFE] => RequestType::Beta,
                [0xFE, 0x01] => RequestType::Legacy,
                [0xFE, 0x01, 0xFA, ..] => RequestType::Extended,
                _ => RequestType::Json,
            };

            self.reply(request_type)
        }

        fn exchange_datagram(
            &self,
            _conf: &Conf,
            _timeout: Duration,
            _request: &[u8],
        ) -> Result<Exchange, ProbeErr> {
            self.reply(RequestType::Bedrock)
        }
    }

    fn refused() -> ProbeErr {
        ProbeErr::ConnectionFailed(io::Error::from(io::ErrorKind::ConnectionRefused))
    }

    fn conf(request_type: RequestType) -> Conf {
        Conf::create("localhost").request_type(request_type)
    }

    #[test]
    fn legacy_success_stops_auto_detect() {
        let transport = ScriptedTransport::with(vec![Ok(legacy_response(
            "51", "1.4.7", "motd", "1", "20",
        ))]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert!(status.online);
        assert_eq!(status.request_type, Some(RequestType::Legacy));
        assert_eq!(status.latency, Some(3));
        assert_eq!(transport.asked(), vec![RequestType::Legacy]);
    }

    #[test]
    fn malformed_legacy_falls_back_to_beta() {
        let transport = ScriptedTransport::with(vec![
            Ok(kick_packet("motd§1§20")),
            Ok(kick_packet("motd§1§20")),
        ]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert!(status.online);
        assert_eq!(status.version.as_deref(), Some(BETA_VERSION));
        assert_eq!(
            transport.asked(),
            vec![RequestType::Legacy, RequestType::Beta]
        );
    }

    #[test]
    fn refused_connection_skips_tcp_generations() {
        let transport = ScriptedTransport::with(vec![Err(refused()), Err(ProbeErr::Timeout)]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert!(!status.online);
        assert_eq!(status.connection_status, ConnectionStatus::ConnectionFailed);
        assert!(status.version.is_none());
        assert_eq!(
            transport.asked(),
            vec![RequestType::Legacy, RequestType::Bedrock]
        );
    }

    #[test]
    fn walks_the_whole_chain() {
        let transport = ScriptedTransport::with(vec![
            Err(ProbeErr::Timeout),
            Ok(vec![0x00]),
            Ok(vec![0x00]),
            Ok(json_response(
                r#"{"version":{"name":"1.20.1","protocol":763},"players":{"max":10,"online":2},"description":"hi"}"#,
            )),
        ]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert!(status.online);
        assert_eq!(status.request_type, Some(RequestType::Json));
        assert_eq!(
            transport.asked(),
            vec![
                RequestType::Legacy,
                RequestType::Beta,
                RequestType::Extended,
                RequestType::Json
            ]
        );
    }

    #[test]
    fn exhausted_reports_strongest_failure() {
        let transport = ScriptedTransport::with(vec![
            Ok(vec![0x00]),
            Err(ProbeErr::Timeout),
            Ok(vec![0x00]),
            Ok(vec![0x00]),
            Ok(vec![0x00]),
        ]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert!(!status.online);
        assert_eq!(status.connection_status, ConnectionStatus::Timeout);
        assert_eq!(status.request_type, Some(RequestType::Beta));
        assert_eq!(transport.asked().len(), 5);
    }

    #[test]
    fn bedrock_refusal_outranks_tcp_timeouts() {
        let transport = ScriptedTransport::with(vec![
            Err(ProbeErr::Timeout),
            Err(ProbeErr::Timeout),
            Err(ProbeErr::Timeout),
            Err(ProbeErr::Timeout),
            Err(refused()),
        ]);
        let status = conf(RequestType::Auto).query_with(&transport);

        assert_eq!(status.connection_status, ConnectionStatus::ConnectionFailed);
        assert_eq!(status.request_type, Some(RequestType::Bedrock));
    }

    #[test]
    fn explicit_request_type_never_falls_back() {
        let transport = ScriptedTransport::with(vec![Ok(vec![0x00])]);
        let status = conf(RequestType::Legacy).query_with(&transport);

        assert_eq!(status.connection_status, ConnectionStatus::Unknown);
        assert_eq!(transport.asked(), vec![RequestType::Legacy]);

        let transport = ScriptedTransport::with(vec![Ok(bedrock_response(
            "MCPE;motd;622;1.20.40;1;10",
        ))]);
        let status = conf(RequestType::Bedrock).query_with(&transport);

        assert!(status.online);
        assert_eq!(transport.asked(), vec![RequestType::Bedrock]);
    }

    #[test]
    fn passed_deadline_probes_nothing() {
        let transport = ScriptedTransport::default();
        let status = conf(RequestType::Auto)
            .deadline(Instant::now())
            .query_with(&transport);

        assert_eq!(status.connection_status, ConnectionStatus::Timeout);
        assert!(transport.asked().is_empty());

        let status = conf(RequestType::Json)
            .deadline(Instant::now())
            .query_with(&transport);

        assert_eq!(status.connection_status, ConnectionStatus::Timeout);
        assert!(transport.asked().is_empty());
    }

    #[test]
    fn deadline_clamps_attempt_timeout() {
        let conf = conf(RequestType::Auto).deadline(Instant::now() + Duration::from_secs(60));

        assert_eq!(attempt_timeout(&conf), Some(conf.timeout));

        let conf = conf.deadline(Instant::now() + Duration::from_secs(1));

        assert!(attempt_timeout(&conf).unwrap() <= Duration::from_secs(1));
    }
}
