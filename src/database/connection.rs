//! Opening SQL Server connections from a resolved [`ConnectionConfig`].
//!
//! One connection per call; nothing is pooled or cached between calls.

use crate::config::ConnectionConfig;
use crate::constants::APPLICATION_NAME;
use crate::error::ServerError;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Create a tiberius Config from the resolved connection settings.
///
/// Fails with a configuration error when required values are missing or the
/// authentication mode is unavailable on this platform.
pub fn create_config(conn: &ConnectionConfig) -> Result<Config, ServerError> {
    conn.validate()?;

    let mut config = Config::new();
    let (host, instance) = conn.host_and_instance();

    config.host(host);
    match instance {
        // The SQL Browser resolves the instance port
        Some(instance) => {
            config.instance_name(instance);
            debug!("Named instance {}, ignoring port {}", instance, conn.port);
        }
        None => config.port(conn.port),
    }

    if let Some(ref database) = conn.database {
        config.database(database);
    }

    if conn.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }

    if conn.trust_server_certificate {
        config.trust_cert();
    }

    config.application_name(APPLICATION_NAME);
    config.authentication(auth_method(conn)?);

    Ok(config)
}

/// Pick the tiberius authentication method.
fn auth_method(conn: &ConnectionConfig) -> Result<AuthMethod, ServerError> {
    if conn.use_windows_auth {
        return windows_auth();
    }

    match (&conn.user, &conn.password) {
        (Some(user), Some(password)) => Ok(AuthMethod::sql_server(user, password)),
        _ => Err(ServerError::config(
            "MSSQL_USER and MSSQL_PASSWORD are required for SQL authentication",
        )),
    }
}

#[cfg(windows)]
fn windows_auth() -> Result<AuthMethod, ServerError> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn windows_auth() -> Result<AuthMethod, ServerError> {
    Err(ServerError::config(
        "MSSQL_WINDOWS_AUTH=true is only supported on Windows hosts",
    ))
}

/// Open a connection to SQL Server.
///
/// Named instances (`host\instance`) are located through the SQL Browser
/// service. An Azure gateway redirect is followed once.
pub async fn open_connection(conn: &ConnectionConfig) -> Result<RawConnection, ServerError> {
    let config = create_config(conn)?;

    if let Some(ref tds) = conn.tds_version {
        debug!("Connecting with TDS {}", tds);
    }

    let tcp = connect_tcp(&config, conn).await?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => {
            debug!("Connection established to {}", conn);
            Ok(client)
        }
        Err(tiberius::error::Error::Routing { host, port }) => {
            info!("Server redirected connection to {}:{}", host, port);
            let mut config = config;
            config.host(&host);
            config.port(port);

            let address = format!("{}:{}", host, port);
            let tcp = TcpStream::connect(&address).await.map_err(|e| {
                ServerError::connection(format!("Failed to connect to {}: {}", address, e))
            })?;
            tcp.set_nodelay(true).map_err(|e| {
                ServerError::connection(format!("Failed to set TCP_NODELAY: {}", e))
            })?;

            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| ServerError::connection_with_source("Failed to connect to SQL Server", e))
        }
        Err(e) => Err(ServerError::connection_with_source(
            "Failed to connect to SQL Server",
            e,
        )),
    }
}

/// Establish the TCP stream, through the SQL Browser for named instances.
async fn connect_tcp(config: &Config, conn: &ConnectionConfig) -> Result<TcpStream, ServerError> {
    let (host, instance) = conn.host_and_instance();

    let tcp = match instance {
        Some(instance) => {
            debug!("Resolving instance {} on {} via SQL Browser", instance, host);
            TcpStream::connect_named(config).await.map_err(|e| {
                ServerError::connection_with_source(
                    format!("Failed to resolve instance {}\\{}", host, instance),
                    e,
                )
            })?
        }
        None => {
            let address = config.get_addr();
            debug!("Creating connection to {}", address);
            TcpStream::connect(&address).await.map_err(|e| {
                ServerError::connection(format!("Failed to connect to {}: {}", address, e))
            })?
        }
    };

    tcp.set_nodelay(true)
        .map_err(|e| ServerError::connection(format!("Failed to set TCP_NODELAY: {}", e)))?;

    Ok(tcp)
}
