use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    // PostgreSQL
    pub psql_username: String,
    pub psql_password: String,
    pub psql_host: String,
    pub psql_port: u16,
    pub psql_db_name: String,
    // Redis
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: String,
    // MinIO
    pub minio_host: String,
    pub minio_port: u16,
    pub minio_username: String,
    pub minio_password: String,
    // OpenObserve
    pub openobserve_protocol: String,
    pub openobserve_host: String,
    pub openobserve_port: u16,
    pub openobserve_username: String,
    pub openobserve_password: String,
    pub openobserve_org: String,
    pub openobserve_stream: String,
}

/// Setup actions requested on the command line. When any flag is set the
/// process performs the actions and exits instead of serving.
#[derive(Debug, Clone, Copy)]
pub struct SetupFlags {
    pub create: bool,
    pub remove: bool,
    pub init: bool,
    pub test: bool,
}

impl SetupFlags {
    pub fn any(&self) -> bool {
        self.create || self.remove || self.init || self.test
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "EnteBus core API server")]
pub struct Args {
    /// Host to bind to (overrides ENTEBUS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ENTEBUS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Create all tables and storage buckets, then exit
    #[arg(long)]
    pub cr: bool,

    /// Remove all tables and storage buckets, then exit
    #[arg(long)]
    pub rm: bool,

    /// Populate tables with fixed sample data, then exit
    #[arg(long)]
    pub init: bool,

    /// Populate data via live API calls against a running server, then exit
    #[arg(long)]
    pub test: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn env_port(key: &str, default: u16) -> Result<u16> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and setup flags.
    pub fn from_env_and_args() -> Result<(Self, SetupFlags)> {
        // Parse CLI once
        let args = Args::parse();

        let cfg = Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("ENTEBUS_HOST", "0.0.0.0")),
            port: match args.port {
                Some(port) => port,
                None => env_port("ENTEBUS_PORT", 8080)?,
            },
            psql_username: env_or("PSQL_DB_USERNAME", "postgres"),
            psql_password: env_or("PSQL_DB_PASSWORD", "password"),
            psql_host: env_or("PSQL_DB_HOST", "localhost"),
            psql_port: env_port("PSQL_DB_PORT", 5432)?,
            psql_db_name: env_or("PSQL_DB_NAME", "postgres"),
            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_port("REDIS_PORT", 6379)?,
            redis_password: env_or("REDIS_PASSWORD", "password"),
            minio_host: env_or("MINIO_HOST", "localhost"),
            minio_port: env_port("MINIO_PORT", 9000)?,
            minio_username: env_or("MINIO_USERNAME", "minio"),
            minio_password: env_or("MINIO_PASSWORD", "password"),
            openobserve_protocol: env_or("OPENOBSERVE_PROTOCOL", "http"),
            openobserve_host: env_or("OPENOBSERVE_HOST", "localhost"),
            openobserve_port: env_port("OPENOBSERVE_PORT", 5080)?,
            openobserve_username: env_or("OPENOBSERVE_USERNAME", "admin@entebus.com"),
            openobserve_password: env_or("OPENOBSERVE_PASSWORD", "password"),
            openobserve_org: env_or("OPENOBSERVE_ORG", "nixbug"),
            openobserve_stream: env_or("OPENOBSERVE_STREAM", "entebus-core-server"),
        };

        let flags = SetupFlags {
            create: args.cr,
            remove: args.rm,
            init: args.init,
            test: args.test,
        };

        Ok((cfg, flags))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Postgres connection URL assembled from the PSQL_DB_* parts.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.psql_username,
            self.psql_password,
            self.psql_host,
            self.psql_port,
            self.psql_db_name
        )
    }

    /// Redis connection URL (password-only auth, as provisioned by the stack).
    pub fn redis_url(&self) -> String {
        format!(
            "redis://:{}@{}:{}",
            self.redis_password, self.redis_host, self.redis_port
        )
    }

    /// MinIO endpoint URL for the S3 client.
    pub fn minio_endpoint(&self) -> String {
        format!("http://{}:{}", self.minio_host, self.minio_port)
    }

    /// OpenObserve JSON ingestion endpoint for the configured org/stream.
    pub fn openobserve_ingest_url(&self) -> String {
        format!(
            "{}://{}:{}/api/{}/{}/_json",
            self.openobserve_protocol,
            self.openobserve_host,
            self.openobserve_port,
            self.openobserve_org,
            self.openobserve_stream
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            psql_username: "postgres".into(),
            psql_password: "password".into(),
            psql_host: "db".into(),
            psql_port: 5432,
            psql_db_name: "entebus".into(),
            redis_host: "cache".into(),
            redis_port: 6379,
            redis_password: "secret".into(),
            minio_host: "minio".into(),
            minio_port: 9000,
            minio_username: "minio".into(),
            minio_password: "password".into(),
            openobserve_protocol: "http".into(),
            openobserve_host: "o2".into(),
            openobserve_port: 5080,
            openobserve_username: "admin@entebus.com".into(),
            openobserve_password: "password".into(),
            openobserve_org: "nixbug".into(),
            openobserve_stream: "entebus-core-server".into(),
        }
    }

    #[test]
    fn database_url_is_composed_from_parts() {
        assert_eq!(
            sample().database_url(),
            "postgres://postgres:password@db:5432/entebus"
        );
    }

    #[test]
    fn redis_url_carries_password_only_auth() {
        assert_eq!(sample().redis_url(), "redis://:secret@cache:6379");
    }

    #[test]
    fn openobserve_url_targets_org_and_stream() {
        assert_eq!(
            sample().openobserve_ingest_url(),
            "http://o2:5080/api/nixbug/entebus-core-server/_json"
        );
    }
}
