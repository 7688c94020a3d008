use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cinedash_client::{
    domains::{
        auth::{LoginCredentials, SessionManager, SessionState},
        player::GrantSource,
    },
    infrastructure::{ApiClient, QueryCache, services::StreamingApiAdapter},
};
use cinedash_config::ConfigLoader;
use env_logger::{Builder, Target};
use log::LevelFilter;

fn init_logger() {
    Builder::new()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Warn)
        .filter_module("cinedash_client", LevelFilter::Debug)
        .filter_module("cinedash_probe", LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let load = ConfigLoader::new()
        .load()
        .context("failed to load cinedash configuration")?;
    let config = load.config;

    let base = ApiClient::new(&config.api).context("failed to build API client")?;
    let sessions = SessionManager::from_config(&base, &config)?;
    let cache = Arc::new(QueryCache::default());
    sessions.register_cache(cache.clone());

    if let SessionState::Authenticated(session) = sessions.restore().await? {
        println!("restored session for {}", session.user.display_name());
    } else {
        let email = std::env::var("CINEDASH_EMAIL")
            .context("no stored session; set CINEDASH_EMAIL and CINEDASH_PASSWORD")?;
        let password =
            std::env::var("CINEDASH_PASSWORD").context("CINEDASH_PASSWORD is not set")?;
        let session = sessions
            .login(LoginCredentials::new(email, password))
            .await
            .context("login failed")?;
        println!("logged in as {} ({})", session.user.display_name(), session.role);
    }

    let Some(video_id) = std::env::args().nth(1) else {
        return Ok(());
    };

    let client = sessions.authorized_client(&base).with_cache(cache);
    let streaming = StreamingApiAdapter::new(client);
    let video = streaming
        .video_metadata(&video_id)
        .await
        .with_context(|| format!("failed to fetch video {video_id}"))?;
    println!("video {}: {}", video.id, video.title);

    let grant = streaming.fetch_grant(&video_id).await?;
    match grant.expires_at {
        Some(expires_at) => println!("stream {} expires at {expires_at}", grant.url),
        None => println!("stream {} has no embedded expiry", grant.url),
    }
    if !sessions.is_authenticated() {
        bail!("session ended while probing");
    }
    Ok(())
}
