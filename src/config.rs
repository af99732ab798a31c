use std::env;

use anyhow::Context;

use crate::commission::CommissionRate;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub stripe: StripeConfig,
    pub commission: CommissionRate,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
    pub connect_refresh_url: String,
    pub connect_return_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let commission = match env::var("PLATFORM_COMMISSION_BPS") {
            Ok(raw) => {
                let bps = raw
                    .parse::<u32>()
                    .context("PLATFORM_COMMISSION_BPS must be an integer")?;
                CommissionRate::from_bps(bps)?
            }
            Err(_) => CommissionRate::default(),
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            stripe: StripeConfig::from_env(),
            commission,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Self {
        Self {
            secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            currency: env::var("STRIPE_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            connect_refresh_url: env::var("STRIPE_CONNECT_REFRESH_URL")
                .unwrap_or_else(|_| "http://localhost:3000/seller/connect/refresh".to_string()),
            connect_return_url: env::var("STRIPE_CONNECT_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/seller/connect/done".to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}
