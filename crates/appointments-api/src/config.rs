//! Environment configuration for the API server and the projector.

use std::net::SocketAddr;
use std::time::Duration;

use appointments_broker::topology::{
    BrokerTopology, DEFAULT_CONSUMER_GROUP, DEFAULT_DEAD_LETTER_TOPIC, DEFAULT_EVENTS_TOPIC,
};
use appointments_projection::retry::RetryPolicy;
use appointments_projection::worker::WorkerConfig;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Reads environment variables; injectable for tests.
pub trait Env {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<F> Env for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        self(key)
    }
}

fn required(env: &impl Env, key: &str) -> Result<String, AppError> {
    env.var(key)
        .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
}

fn parsed<T>(env: &impl Env, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env.var(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw}): {e}")))
    })
}

fn topology(env: &impl Env, brokers: String) -> BrokerTopology {
    BrokerTopology {
        events_topic: env
            .var("APPOINTMENT_EVENTS_TOPIC")
            .unwrap_or_else(|| DEFAULT_EVENTS_TOPIC.to_owned()),
        dead_letter_topic: env
            .var("APPOINTMENT_DEAD_LETTER_TOPIC")
            .unwrap_or_else(|| DEFAULT_DEAD_LETTER_TOPIC.to_owned()),
        consumer_group: env
            .var("PROJECTOR_CONSUMER_GROUP")
            .unwrap_or_else(|| DEFAULT_CONSUMER_GROUP.to_owned()),
        ..BrokerTopology::new(brokers)
    }
}

/// Configuration of the HTTP command service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// `PostgreSQL` connection string of the write store.
    pub database_url: String,
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// Broker to publish to; `None` runs with an absent publisher.
    pub broker: Option<BrokerTopology>,
    /// OTLP collector endpoint, if span export is enabled.
    pub otlp_endpoint: Option<String>,
}

impl ApiConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_source(&ProcessEnv)
    }

    /// Reads the configuration from `env`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_source(env: &impl Env) -> Result<Self, AppError> {
        let database_url = required(env, "DATABASE_URL")?;
        let host = env.var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port: u16 = parsed(env, "PORT", DEFAULT_PORT)?;
        let listen_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        Ok(Self {
            database_url,
            listen_addr,
            broker: env.var("KAFKA_BROKERS").map(|brokers| topology(env, brokers)),
            otlp_endpoint: env.var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

/// Configuration of the projection worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorConfig {
    /// Broker to consume from and dead-letter to.
    pub broker: BrokerTopology,
    /// Redis read store.
    pub redis_url: String,
    /// Delivery and retry bounds.
    pub worker: WorkerConfig,
    /// OTLP collector endpoint, if span export is enabled.
    pub otlp_endpoint: Option<String>,
}

impl ProjectorConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `KAFKA_BROKERS` is missing or a numeric
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_source(&ProcessEnv)
    }

    /// Reads the configuration from `env`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_source(env: &impl Env) -> Result<Self, AppError> {
        let brokers = required(env, "KAFKA_BROKERS")?;
        let defaults = WorkerConfig::default();
        let max_deliveries: u32 =
            parsed(env, "PROJECTOR_MAX_DELIVERIES", defaults.max_deliveries)?;
        let retry_attempts: u32 = parsed(
            env,
            "PROJECTOR_RETRY_ATTEMPTS",
            defaults.read_store_retry.max_attempts,
        )?;
        let retry_base_ms: u64 = parsed(env, "PROJECTOR_RETRY_BASE_MS", 100)?;
        if max_deliveries == 0 {
            return Err(AppError::Config(
                "PROJECTOR_MAX_DELIVERIES must be at least 1".into(),
            ));
        }
        if retry_attempts == 0 {
            return Err(AppError::Config(
                "PROJECTOR_RETRY_ATTEMPTS must be at least 1".into(),
            ));
        }

        let retry = RetryPolicy {
            max_attempts: retry_attempts,
            base_delay: Duration::from_millis(retry_base_ms),
            ..RetryPolicy::default()
        };
        Ok(Self {
            broker: topology(env, brokers),
            redis_url: env
                .var("REDIS_URL")
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_owned()),
            worker: WorkerConfig {
                max_deliveries,
                read_store_retry: retry.clone(),
                dead_letter_retry: retry,
            },
            otlp_endpoint: env.var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}
