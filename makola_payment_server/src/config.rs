use std::env;

use chrono::Duration;
use flutterwave_tools::FlutterwaveConfig;
use log::*;
use makola_payment_engine::DEFAULT_AMOUNT_TOLERANCE;
use mps_common::{parse_boolean_flag, MinorUnits, Secret};
use paystack_tools::PaystackConfig;

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8480;
const DEFAULT_CART_TTL: Duration = Duration::hours(48);
const DEFAULT_PROVIDERS: &str = "paystack,flutterwave";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
    /// Verified amounts may differ from the cart total by up to this many minor units before the
    /// recorded mismatch escalates from info to warning. A mismatch never blocks an order.
    pub amount_tolerance: MinorUnits,
    /// Carts untouched for longer than this are reclaimed by the sweeper.
    pub cart_ttl: Duration,
    /// The payment providers to register, by lowercase name.
    pub providers: Vec<String>,
    pub paystack: PaystackConfig,
    pub flutterwave: FlutterwaveConfig,
    pub mailer: MailerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            amount_tolerance: MinorUnits::from(DEFAULT_AMOUNT_TOLERANCE),
            cart_ttl: DEFAULT_CART_TTL,
            providers: vec![],
            paystack: PaystackConfig::default(),
            flutterwave: FlutterwaveConfig::default(),
            mailer: MailerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MPS_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MPS_USE_FORWARDED").ok(), false);
        let amount_tolerance = configure_amount_tolerance();
        let cart_ttl = configure_cart_ttl();
        let providers = configure_providers();
        let paystack = PaystackConfig::new_from_env_or_default();
        let flutterwave = FlutterwaveConfig::new_from_env_or_default();
        let mailer = MailerConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            amount_tolerance,
            cart_ttl,
            providers,
            paystack,
            flutterwave,
            mailer,
        }
    }
}

fn configure_amount_tolerance() -> MinorUnits {
    env::var("MPS_AMOUNT_TOLERANCE")
        .map_err(|_| {
            info!(
                "🪛️ MPS_AMOUNT_TOLERANCE is not set. Using the default value of {DEFAULT_AMOUNT_TOLERANCE} minor \
                 units."
            )
        })
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for MPS_AMOUNT_TOLERANCE. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_AMOUNT_TOLERANCE)
        .into()
}

fn configure_cart_ttl() -> Duration {
    env::var("MPS_CART_TTL_HOURS")
        .map_err(|_| {
            info!("🪛️ MPS_CART_TTL_HOURS is not set. Using the default value of {} hrs.", DEFAULT_CART_TTL.num_hours())
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for MPS_CART_TTL_HOURS. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_CART_TTL)
}

fn configure_providers() -> Vec<String> {
    let raw = env::var("MPS_PAYMENT_PROVIDERS").ok().unwrap_or_else(|| {
        info!("🪛️ MPS_PAYMENT_PROVIDERS is not set. Registering the default set: {DEFAULT_PROVIDERS}.");
        DEFAULT_PROVIDERS.to_string()
    });
    let providers = raw.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect::<Vec<_>>();
    if providers.is_empty() {
        warn!(
            "🚨️ MPS_PAYMENT_PROVIDERS is set but empty. The server will run, but cannot initialize or verify any \
             payments."
        );
    }
    providers
}

//-------------------------------------------------  MailerConfig  -----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct MailerConfig {
    /// POST endpoint of the HTTP mail relay. When unset, order confirmations are logged instead
    /// of sent.
    pub api_url: Option<String>,
    pub api_key: Secret<String>,
    /// The From address on outgoing confirmations.
    pub sender: String,
}

impl MailerConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("MPS_MAIL_API_URL").ok();
        if api_url.is_none() {
            info!("🪛️ MPS_MAIL_API_URL is not set. Order confirmations will be logged instead of emailed.");
        }
        let api_key = Secret::new(env::var("MPS_MAIL_API_KEY").unwrap_or_default());
        let sender = env::var("MPS_MAIL_FROM").ok().unwrap_or_else(|| {
            debug!("🪛️ MPS_MAIL_FROM is not set, using orders@makola-market.com");
            "orders@makola-market.com".to_string()
        });
        Self { api_url, api_key, sender }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that handlers need at request time. Generally we try to
/// keep this as small as possible, and exclude secrets to avoid passing sensitive information
/// around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
