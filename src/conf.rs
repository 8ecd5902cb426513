use crate::{server, share::NetTransport, RequestType, ServerStatus, StatErr, Transport};
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::{Duration, Instant},
};

/// Default Java Edition port.
pub const DEFAULT_PORT: u16 = 25565;
/// Default per-attempt timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Main struct used for configuring a query.
///
/// By default the port is 25565, the timeout five seconds and every protocol
/// generation is tried in turn ([RequestType::Auto]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conf {
    /// Server IP address or a domain name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Time budget of each codec attempt, covering connect and read.
    pub timeout: Duration,
    /// Protocol generation to speak.
    pub request_type: RequestType,
    /// Cut-off for the whole query, across every attempt.
    pub deadline: Option<Instant>,
}

impl ToSocketAddrs for Conf {
    type Iter = std::vec::IntoIter<SocketAddr>;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        (&*self.host, self.port).to_socket_addrs()
    }
}

impl std::fmt::Display for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Conf {
    /// Create a query configuration using the default port.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mcstat::{Conf, RequestType};
    /// # use std::time::Duration;
    /// #
    /// let conf = Conf::create("www.example.com");
    /// #
    /// # assert_eq!(conf.host, "www.example.com");
    /// # assert_eq!(conf.port, 25565);
    /// # assert_eq!(conf.timeout, Duration::from_secs(5));
    /// # assert_eq!(conf.request_type, RequestType::Auto);
    /// ```
    pub fn create(host: &str) -> Self {
        Self {
            host: host.trim().into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_type: RequestType::Auto,
            deadline: None,
        }
    }

    /// Create a query configuration using the specified port.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcstat::Conf;
    /// #
    /// let conf = Conf::create_with_port("www.example.com", 19132).unwrap();
    /// #
    /// # assert_eq!(conf.port, 19132);
    /// # assert!(Conf::create_with_port("www.example.com", 0).is_err());
    /// ```
    pub fn create_with_port(host: &str, port: u16) -> Result<Self, StatErr> {
        if port == 0 {
            return Err(StatErr::InvalidPort(port.to_string()));
        }

        Ok(Self {
            port,
            ..Self::create(host)
        })
    }

    /// Create a query configuration from a `host:port` string.
    ///
    /// # Example
    ///
    /// ```
    /// # use mcstat::{Conf, StatErr};
    /// #
    /// # fn main() -> Result<(), StatErr> {
    ///     let conf = Conf::create_from_str("www.example.com:25566")?;
    /// #
    /// #   assert_eq!(conf.host, "www.example.com");
    /// #   assert_eq!(conf.port, 25566);
    /// #
    /// #   assert!(Conf::create_from_str("25565").is_err());
    /// #   assert!(Conf::create_from_str("www.example.com:-1").is_err());
    /// #   Ok(())
    /// # }
    /// ```
    pub fn create_from_str(addr: &str) -> Result<Self, StatErr> {
        let addr_split = addr.split(':').map(|x| x.trim()).collect::<Vec<_>>();

        if addr_split.len() != 2 || addr_split[0].is_empty() {
            return Err(StatErr::InvalidAddr(addr.into()));
        }

        match addr_split[1].parse::<u16>() {
            Ok(port) => Self::create_with_port(addr_split[0], port),
            Err(_) => Err(StatErr::InvalidPort(addr_split[1].into())),
        }
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Result<Self, StatErr> {
        if timeout.is_zero() {
            return Err(StatErr::InvalidTimeout(format!("{:?}", timeout)));
        }

        self.timeout = timeout;
        Ok(self)
    }

    /// Set the per-attempt timeout in whole seconds.
    pub fn timeout_secs(self, secs: u64) -> Result<Self, StatErr> {
        self.timeout(Duration::from_secs(secs))
    }

    /// Restrict the query to one protocol generation.
    pub fn request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }

    /// Abandon the query once `deadline` passes, whatever attempt it is in.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Query the server using the configured [RequestType].
    ///
    /// Never fails: network and protocol problems are reported through
    /// [ServerStatus::connection_status].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mcstat::{Conf, StatErr};
    ///
    /// fn main() -> Result<(), StatErr> {
    ///     let status = Conf::create("www.example.com").timeout_secs(3)?.query();
    ///
    ///     println!("{}", status);
    ///     Ok(())
    /// }
    /// ```
    pub fn query(&self) -> ServerStatus {
        self.query_with(&NetTransport)
    }

    /// Same as [Conf::query] over a caller supplied [Transport].
    pub fn query_with<T: Transport>(&self, transport: &T) -> ServerStatus {
        server::query(self, transport)
    }

    /// Probe with the beta 1.8 to 1.3 protocol only.
    pub fn get_beta_server_status(&self) -> ServerStatus {
        server::get_beta_server_status(self, &NetTransport, self.timeout)
    }

    /// Probe with the 1.4 to 1.5 protocol only.
    pub fn get_legacy_server_status(&self) -> ServerStatus {
        server::get_legacy_server_status(self, &NetTransport, self.timeout)
    }

    /// Probe with the 1.6 protocol only.
    pub fn get_extended_server_status(&self) -> ServerStatus {
        server::get_extended_server_status(self, &NetTransport, self.timeout)
    }

    /// Probe with the 1.7+ [Server List Ping](https://wiki.vg/Server_List_Ping) only.
    pub fn get_json_server_status(&self) -> ServerStatus {
        server::get_json_server_status(self, &NetTransport, self.timeout)
    }

    /// Probe a Bedrock Edition server with a RakNet unconnected ping.
    pub fn get_bedrock_server_status(&self) -> ServerStatus {
        server::get_bedrock_server_status(self, &NetTransport, self.timeout)
    }
}
