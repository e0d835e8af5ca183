//! Connection configuration for the MSSQL MCP server.
//!
//! Configuration is resolved from environment variables following the 12-factor
//! app pattern. Resolution never fails: missing required values are reported by
//! [`ConnectionConfig::validate`] when a connection is attempted.

use crate::constants::{
    env, AZURE_SQL_SUFFIX, AZURE_TDS_VERSION, DEFAULT_PORT, DEFAULT_SERVER, LOCALDB_PREFIX,
    LOCAL_HOST_ALIAS,
};
use crate::error::ServerError;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Connection parameters resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server name as the driver should see it (LocalDB already rewritten).
    pub server: String,

    /// Database name. Required at connection time.
    pub database: Option<String>,

    /// SQL authentication user. Always `None` with Windows authentication.
    pub user: Option<String>,

    /// SQL authentication password. Always `None` with Windows authentication.
    pub password: Option<String>,

    /// TCP port (default: 1433)
    pub port: u16,

    /// Use integrated Windows authentication instead of user/password.
    pub use_windows_auth: bool,

    /// Require TLS encryption. Forced on for Azure SQL.
    pub encrypt: bool,

    /// TDS protocol version pinned for the server, if any.
    pub tds_version: Option<String>,

    /// Trust the server certificate without validation (self-signed certs).
    pub trust_server_certificate: bool,
}

impl ConnectionConfig {
    /// Resolve a configuration from the process environment.
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&vars)
    }

    /// Resolve a configuration from a map of environment values.
    ///
    /// # Environment Variables
    ///
    /// - `MSSQL_SERVER`: Server hostname, `host\instance`, `(localdb)\instance`
    ///   or an Azure SQL endpoint (default: localhost)
    /// - `MSSQL_DATABASE`: Database name (required at connection time)
    /// - `MSSQL_USER` / `MSSQL_PASSWORD`: SQL authentication credentials
    /// - `MSSQL_PORT`: Port number (default: 1433)
    /// - `MSSQL_WINDOWS_AUTH`: Use Windows authentication (default: false)
    /// - `MSSQL_ENCRYPT`: Enable TLS (default: false, always true for Azure)
    /// - `MSSQL_TRUST_CERT`: Trust server certificate (default: false)
    pub fn resolve(vars: &HashMap<String, String>) -> Self {
        let lookup = |key: &str| {
            vars.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let raw_server = lookup(env::SERVER).unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let database = lookup(env::DATABASE);
        let use_windows_auth = lookup(env::WINDOWS_AUTH).is_some_and(|v| is_truthy(&v));

        let (user, password) = if use_windows_auth {
            if lookup(env::USER).is_some() || lookup(env::PASSWORD).is_some() {
                info!("Windows authentication enabled, ignoring MSSQL_USER/MSSQL_PASSWORD");
            }
            (None, None)
        } else {
            (lookup(env::USER), lookup(env::PASSWORD))
        };

        let (encrypt, tds_version) = if is_azure_endpoint(&raw_server) {
            info!(
                "Detected Azure SQL endpoint, forcing encryption and TDS {}",
                AZURE_TDS_VERSION
            );
            (true, Some(AZURE_TDS_VERSION.to_string()))
        } else {
            let encrypt = lookup(env::ENCRYPT).is_some_and(|v| is_truthy(&v));
            (encrypt, None)
        };

        let server = match rewrite_localdb(&raw_server) {
            Some(rewritten) => {
                info!("Detected LocalDB server, using {}", rewritten);
                rewritten
            }
            None => raw_server,
        };

        let port = match lookup(env::PORT) {
            Some(raw) => parse_port(&raw).unwrap_or_else(|| {
                warn!(
                    "Invalid {} value {:?}, using default port {}",
                    env::PORT,
                    raw,
                    DEFAULT_PORT
                );
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let trust_server_certificate = lookup(env::TRUST_CERT).is_some_and(|v| is_truthy(&v));

        Self {
            server,
            database,
            user,
            password,
            port,
            use_windows_auth,
            encrypt,
            tds_version,
            trust_server_certificate,
        }
    }

    /// Check that everything needed to open a connection is present.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.database.is_none() {
            return Err(ServerError::config("MSSQL_DATABASE is required"));
        }

        if self.use_windows_auth {
            return Ok(());
        }

        match (&self.user, &self.password) {
            (Some(_), Some(_)) => Ok(()),
            (Some(_), None) => Err(ServerError::config(
                "MSSQL_PASSWORD is required when MSSQL_USER is set",
            )),
            (None, Some(_)) => Err(ServerError::config(
                "MSSQL_USER is required when MSSQL_PASSWORD is set",
            )),
            (None, None) => Err(ServerError::config(
                "Authentication required: set MSSQL_USER and MSSQL_PASSWORD, or MSSQL_WINDOWS_AUTH=true",
            )),
        }
    }

    /// Split the server into host and optional named instance.
    ///
    /// `.\SQLEXPRESS` resolves to host `localhost`, instance `SQLEXPRESS`.
    pub fn host_and_instance(&self) -> (&str, Option<&str>) {
        let (host, instance) = match self.server.split_once('\\') {
            Some((host, instance)) if !instance.is_empty() => (host, Some(instance)),
            Some((host, _)) => (host, None),
            None => (self.server.as_str(), None),
        };

        if host == LOCAL_HOST_ALIAS || host.is_empty() {
            (DEFAULT_SERVER, instance)
        } else {
            (host, instance)
        }
    }

    /// Whether this configuration targets Azure SQL Database.
    pub fn is_azure(&self) -> bool {
        is_azure_endpoint(&self.server)
    }

    /// Describe the login identity for log lines without exposing secrets.
    pub fn login_description(&self) -> &str {
        if self.use_windows_auth {
            "Windows Auth"
        } else {
            self.user.as_deref().unwrap_or("<no user>")
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("use_windows_auth", &self.use_windows_auth)
            .field("encrypt", &self.encrypt)
            .field("tds_version", &self.tds_version)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{} as {}",
            self.server,
            self.port,
            self.database.as_deref().unwrap_or("<no database>"),
            self.login_description()
        )
    }
}

/// Interpret a boolean environment value.
pub fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Check whether a server name points at Azure SQL Database.
pub fn is_azure_endpoint(server: &str) -> bool {
    server.to_ascii_lowercase().contains(AZURE_SQL_SUFFIX)
}

/// Rewrite `(localdb)\instance` to the `.\instance` form the driver connects to.
///
/// Returns `None` when the server is not a LocalDB name.
pub fn rewrite_localdb(server: &str) -> Option<String> {
    let prefix_len = LOCALDB_PREFIX.len();
    let head = server.get(..prefix_len)?;
    if !head.eq_ignore_ascii_case(LOCALDB_PREFIX) {
        return None;
    }
    let instance = &server[prefix_len..];
    Some(format!("{}\\{}", LOCAL_HOST_ALIAS, instance))
}

/// Parse a port number, rejecting zero.
fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::resolve(&HashMap::new());
        assert_eq!(config.server, "localhost");
        assert_eq!(config.port, 1433);
        assert!(config.database.is_none());
        assert!(config.user.is_none());
        assert!(!config.encrypt);
        assert!(!config.use_windows_auth);
        assert!(config.tds_version.is_none());
    }

    #[test]
    fn test_azure_scenario() {
        let config = ConnectionConfig::resolve(&env_of(&[
            ("MSSQL_SERVER", "foo.database.windows.net"),
            ("MSSQL_DATABASE", "db1"),
            ("MSSQL_USER", "u"),
            ("MSSQL_PASSWORD", "p"),
            ("MSSQL_ENCRYPT", "false"),
        ]));

        assert_eq!(config.server, "foo.database.windows.net");
        assert_eq!(config.database.as_deref(), Some("db1"));
        assert!(config.encrypt);
        assert_eq!(config.tds_version.as_deref(), Some("7.4"));
        assert_eq!(config.port, 1433);
        assert!(config.is_azure());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_azure_forces_encryption_for_any_encrypt_value() {
        for encrypt in ["true", "false", "0", "garbage", ""] {
            let config = ConnectionConfig::resolve(&env_of(&[
                ("MSSQL_SERVER", "Prod.Database.Windows.Net"),
                ("MSSQL_ENCRYPT", encrypt),
            ]));
            assert!(config.encrypt, "encrypt={encrypt:?}");
            assert_eq!(config.tds_version.as_deref(), Some("7.4"));
        }
    }

    #[test]
    fn test_encrypt_flag_outside_azure() {
        let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_ENCRYPT", "TRUE")]));
        assert!(config.encrypt);
        assert!(config.tds_version.is_none());

        let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_ENCRYPT", "no")]));
        assert!(!config.encrypt);
    }

    #[test]
    fn test_localdb_rewrite() {
        for server in [
            "(localdb)\\MSSQLLocalDB",
            "(LocalDB)\\MSSQLLocalDB",
            "(LOCALDB)\\ProjectsV13",
        ] {
            let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_SERVER", server)]));
            assert!(
                !config.server.to_ascii_lowercase().contains("(localdb)"),
                "{} resolved to {}",
                server,
                config.server
            );
            assert!(config.server.starts_with(".\\"));
        }

        let config =
            ConnectionConfig::resolve(&env_of(&[("MSSQL_SERVER", "(localdb)\\MSSQLLocalDB")]));
        assert_eq!(config.server, ".\\MSSQLLocalDB");
        assert_eq!(
            config.host_and_instance(),
            ("localhost", Some("MSSQLLocalDB"))
        );
    }

    #[test]
    fn test_rewrite_localdb_ignores_other_servers() {
        assert_eq!(rewrite_localdb("localhost"), None);
        assert_eq!(rewrite_localdb("db.example.com\\SQLEXPRESS"), None);
        assert_eq!(rewrite_localdb("(local"), None);
    }

    #[test]
    fn test_host_and_instance() {
        let mut config = ConnectionConfig::resolve(&HashMap::new());
        assert_eq!(config.host_and_instance(), ("localhost", None));

        config.server = "db01\\SQLEXPRESS".to_string();
        assert_eq!(config.host_and_instance(), ("db01", Some("SQLEXPRESS")));

        config.server = "db01\\".to_string();
        assert_eq!(config.host_and_instance(), ("db01", None));
    }

    #[test]
    fn test_invalid_port_falls_back() {
        for raw in ["not-a-number", "0", "-5", "70000"] {
            let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_PORT", raw)]));
            assert_eq!(config.port, 1433, "port={raw:?}");
        }

        let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_PORT", "14330")]));
        assert_eq!(config.port, 14330);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn resolve_capturing_logs(pairs: &[(&str, &str)]) -> (ConnectionConfig, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            ConnectionConfig::resolve(&env_of(pairs))
        });
        (config, buffer.contents())
    }

    #[test]
    fn test_invalid_port_logs_warning() {
        let (config, logs) = resolve_capturing_logs(&[("MSSQL_PORT", "not-a-number")]);

        assert_eq!(config.port, 1433);
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("MSSQL_PORT"), "logs: {logs}");
        assert!(logs.contains("not-a-number"), "logs: {logs}");
        assert!(logs.contains("1433"), "logs: {logs}");
    }

    #[test]
    fn test_valid_port_logs_no_warning() {
        let (config, logs) = resolve_capturing_logs(&[("MSSQL_PORT", "14330")]);

        assert_eq!(config.port, 14330);
        assert!(!logs.contains("WARN"), "logs: {logs}");
    }

    #[test]
    fn test_windows_auth_discards_credentials() {
        let config = ConnectionConfig::resolve(&env_of(&[
            ("MSSQL_DATABASE", "db1"),
            ("MSSQL_USER", "sa"),
            ("MSSQL_PASSWORD", "secret"),
            ("MSSQL_WINDOWS_AUTH", "true"),
        ]));

        assert!(config.use_windows_auth);
        assert!(config.user.is_none());
        assert!(config.password.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.login_description(), "Windows Auth");
    }

    #[test]
    fn test_validate_reports_missing_values() {
        let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_USER", "sa")]));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ServerError::Configuration(_)));
        assert!(err.to_string().contains("MSSQL_DATABASE"));

        let config = ConnectionConfig::resolve(&env_of(&[
            ("MSSQL_DATABASE", "db1"),
            ("MSSQL_USER", "sa"),
        ]));
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("MSSQL_PASSWORD"));

        let config = ConnectionConfig::resolve(&env_of(&[("MSSQL_DATABASE", "db1")]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = ConnectionConfig::resolve(&env_of(&[
            ("MSSQL_SERVER", "  "),
            ("MSSQL_DATABASE", ""),
        ]));
        assert_eq!(config.server, "localhost");
        assert!(config.database.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::resolve(&env_of(&[
            ("MSSQL_USER", "sa"),
            ("MSSQL_PASSWORD", "hunter2"),
        ]));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(!config.to_string().contains("hunter2"));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("MSSQL_SERVER", "myserver.database.windows.net");
        std::env::set_var("MSSQL_DATABASE", "testdb");
        std::env::set_var("MSSQL_PORT", "not-a-number");

        let config = ConnectionConfig::from_env();

        std::env::remove_var("MSSQL_SERVER");
        std::env::remove_var("MSSQL_DATABASE");
        std::env::remove_var("MSSQL_PORT");

        assert_eq!(config.server, "myserver.database.windows.net");
        assert_eq!(config.database.as_deref(), Some("testdb"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.encrypt);
        assert_eq!(config.tds_version.as_deref(), Some("7.4"));
    }
}
