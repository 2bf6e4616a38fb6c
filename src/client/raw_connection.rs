//! Blocking TCP (and TLS) connection to a single server

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::control_plane::{ControlPlane, ControlPlaneExt};
use crate::config::{AuthConfig, ClusterEndpoint, TlsConfig};
use crate::utils::{ConnectionError, RespDecoder, RespEncoder, RespValue};

/// Raw connection wrapper (TCP or TLS)
pub enum RawConnection {
    Tcp {
        writer: BufWriter<TcpStream>,
        reader: BufReader<TcpStream>,
    },
    #[cfg(feature = "native-tls-backend")]
    NativeTls {
        stream: BufReader<native_tls::TlsStream<TcpStream>>,
    },
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectionError> {
    let connect_err = |source| ConnectionError::ConnectFailed {
        host: host.to_string(),
        port,
        source,
    };
    (host, port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| connect_err(io::Error::new(io::ErrorKind::NotFound, "No addresses found")))
}

fn open_socket(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream, ConnectionError> {
    let addr = resolve(host, port)?;
    let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
        ConnectionError::ConnectFailed {
            host: host.to_string(),
            port,
            source: e,
        }
    })?;
    stream.set_nodelay(true).ok();
    Ok(stream)
}

impl RawConnection {
    pub fn connect_tcp(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let stream = open_socket(host, port, connect_timeout)?;
        let writer = BufWriter::with_capacity(
            65536,
            stream
                .try_clone()
                .map_err(|e| ConnectionError::ConnectFailed {
                    host: host.to_string(),
                    port,
                    source: e,
                })?,
        );
        let reader = BufReader::with_capacity(65536, stream);

        Ok(RawConnection::Tcp { writer, reader })
    }

    #[cfg(feature = "native-tls-backend")]
    pub fn connect_tls(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        tls_config: &TlsConfig,
    ) -> Result<Self, ConnectionError> {
        use native_tls::{Certificate, TlsConnector};

        let mut builder = TlsConnector::builder();
        if tls_config.skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        if let Some(ref ca_path) = tls_config.ca_cert {
            let ca_data = std::fs::read(ca_path).map_err(|e| {
                ConnectionError::TlsFailed(format!("Failed to read CA cert: {}", e))
            })?;
            let cert = Certificate::from_pem(&ca_data)
                .map_err(|e| ConnectionError::TlsFailed(format!("Invalid CA cert: {}", e)))?;
            builder.add_root_certificate(cert);
        }
        let connector = builder.build().map_err(|e| {
            ConnectionError::TlsFailed(format!("Failed to build TLS connector: {}", e))
        })?;

        let tcp_stream = open_socket(host, port, connect_timeout)?;
        let sni_host = tls_config.sni.as_deref().unwrap_or(host);
        let tls_stream = connector
            .connect(sni_host, tcp_stream)
            .map_err(|e| ConnectionError::TlsFailed(e.to_string()))?;

        Ok(RawConnection::NativeTls {
            stream: BufReader::with_capacity(65536, tls_stream),
        })
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            RawConnection::Tcp { writer, .. } => writer.write_all(buf),
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => stream.get_mut().write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RawConnection::Tcp { writer, .. } => writer.flush(),
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => stream.get_mut().flush(),
        }
    }

    fn read_response(&mut self) -> io::Result<RespValue> {
        match self {
            RawConnection::Tcp { reader, .. } => RespDecoder::new(reader).decode(),
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => RespDecoder::new(stream).decode(),
        }
    }

    pub fn set_timeouts(&mut self, timeout: Duration) -> io::Result<()> {
        let socket = match self {
            RawConnection::Tcp { reader, .. } => reader.get_ref(),
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => stream.get_ref().get_ref(),
        };
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))
    }

    /// Send a pre-encoded command and read its reply
    pub fn execute_encoded(&mut self, encoder: &RespEncoder) -> io::Result<RespValue> {
        self.write_all(encoder.as_bytes())?;
        self.flush()?;
        self.read_response()
    }
}

impl ControlPlane for RawConnection {
    fn execute_binary(&mut self, args: &[&[u8]]) -> io::Result<RespValue> {
        let size: usize = args.iter().map(|a| a.len() + 16).sum();
        let mut encoder = RespEncoder::with_capacity(size + 16);
        encoder.encode_command(args);
        self.execute_encoded(&encoder)
    }
}

/// Creates authenticated connections for one cluster
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub tls_config: Option<TlsConfig>,
    pub auth: Option<AuthConfig>,
}

impl ConnectionFactory {
    pub fn for_endpoint(endpoint: &ClusterEndpoint) -> Self {
        Self {
            connect_timeout: endpoint.connect_timeout,
            request_timeout: endpoint.request_timeout,
            tls_config: endpoint.tls.clone(),
            auth: endpoint.auth.clone(),
        }
    }

    pub fn create(&self, host: &str, port: u16) -> Result<RawConnection, ConnectionError> {
        let mut conn = match &self.tls_config {
            #[cfg(feature = "native-tls-backend")]
            Some(tls) => RawConnection::connect_tls(host, port, self.connect_timeout, tls)?,
            #[cfg(not(feature = "native-tls-backend"))]
            Some(_) => {
                return Err(ConnectionError::TlsFailed(
                    "TLS support not compiled in (enable the native-tls-backend feature)"
                        .to_string(),
                ));
            }
            None => RawConnection::connect_tcp(host, port, self.connect_timeout)?,
        };

        conn.set_timeouts(self.request_timeout).ok();

        if let Some(ref auth) = self.auth {
            conn.authenticate(&auth.password, auth.username.as_deref())
                .map_err(|e| ConnectionError::AuthFailed(format!("{}:{}: {}", host, port, e)))?;
        }

        debug!("Connected to {}:{}", host, port);
        Ok(conn)
    }
}
