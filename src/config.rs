use anyhow::Context;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub base_url: String,
    pub upload_preset: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// None disables audio upload; entries are then stored without audio URLs.
    pub media: Option<MediaSettings>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let port: u16 = match std::env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a valid port number")?,
            Err(_) => 8000,
        };
        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(value) => value.parse().context("BIND_ADDR must be host:port")?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let media = match std::env::var("MEDIA_BASE_URL") {
            Ok(base_url) => Some(MediaSettings {
                base_url,
                upload_preset: std::env::var("MEDIA_UPLOAD_PRESET")
                    .context("MEDIA_UPLOAD_PRESET must be set when MEDIA_BASE_URL is")?,
                api_key: std::env::var("MEDIA_API_KEY").ok(),
            }),
            Err(_) => None,
        };

        Ok(Settings {
            database_url,
            bind_addr,
            media,
        })
    }
}
