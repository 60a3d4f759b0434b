use inkpot_api::server::{ServerState, TokenPolicy, app};
use inkpot_common::{
    snowflake::{SnowflakeOrigin, SnowflakePartOutOfRangeError},
    util::{NonPositiveDurationError, PositiveDuration},
};
use inkpot_db::{DbClient, DbError, MemoryClient, PgClient};
use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid worker or process id: {0}")]
    SnowflakeOrigin(#[from] SnowflakePartOutOfRangeError),
    #[error("Invalid token lifetime: {0}")]
    TokenTtl(#[from] NonPositiveDurationError),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_server_address")]
    server_address: IpAddr,
    #[serde(default = "default_server_port")]
    server_port: u16,
    database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default)]
    worker_id: u8,
    #[serde(default)]
    process_id: u8,
    token_ttl_seconds: Option<i64>,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_server_port() -> u16 {
    8000
}

fn default_database_max_connections() -> u32 {
    5
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkpot_api=debug,inkpot_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_db(env: &Env, origin: SnowflakeOrigin) -> Result<Arc<dyn DbClient>, InitError> {
    match &env.database_url {
        Some(database_url) => {
            let client =
                PgClient::connect(database_url, env.database_max_connections, origin).await?;
            info!("Connected to database");
            Ok(Arc::new(client))
        }
        None => {
            warn!("DATABASE_URL is not set, keeping all data in memory");
            Ok(Arc::new(MemoryClient::new(origin)))
        }
    }
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received ctrl-c, shutting down"),
            Err(e) => error!(error = %e, "Could not listen for ctrl-c, shutting down"),
        }
        trigger.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let origin = SnowflakeOrigin::new(env.worker_id, env.process_id)?;
    let token_policy = TokenPolicy {
        expires_after: env
            .token_ttl_seconds
            .map(PositiveDuration::from_seconds)
            .transpose()?,
    };
    let db_client = connect_db(&env, origin).await?;

    let app = app(ServerState {
        db_client,
        token_policy,
    });

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::Env;
    use std::net::{IpAddr, Ipv4Addr};

    fn parse(vars: &[(&str, &str)]) -> Result<Env, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
    }

    #[test]
    fn defaults() {
        let env = parse(&[]).unwrap();

        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(env.server_port, 8000);
        assert_eq!(env.database_url, None);
        assert_eq!(env.database_max_connections, 5);
        assert_eq!((env.worker_id, env.process_id), (0, 0));
        assert_eq!(env.token_ttl_seconds, None);
    }

    #[test]
    fn overrides() {
        let env = parse(&[
            ("SERVER_ADDRESS", "0.0.0.0"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/inkpot"),
            ("WORKER_ID", "3"),
            ("TOKEN_TTL_SECONDS", "3600"),
        ])
        .unwrap();

        assert_eq!(env.server_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(env.server_port, 8080);
        assert_eq!(env.database_url.as_deref(), Some("postgres://localhost/inkpot"));
        assert_eq!(env.worker_id, 3);
        assert_eq!(env.token_ttl_seconds, Some(3600));
    }

    #[test]
    fn rejects_malformed_port() {
        assert!(parse(&[("SERVER_PORT", "eighty")]).is_err());
    }
}
