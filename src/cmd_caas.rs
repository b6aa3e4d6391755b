//! `caas` subcommands.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

use snap_change_stream::{
    fetch_secure_token, CaasEndpoints, ChangeSocket, ChangeStreamAdapter, DocumentProbe, HttpProbe,
    SocketSettings, StaticLocales,
};
use snap_config::{CaasConfig, Config};
use snap_protocols::DocumentWaiter;

use crate::cli::CaasAction;

pub async fn handle(action: CaasAction, config: &Config) -> anyhow::Result<()> {
    let caas = config
        .caas
        .as_ref()
        .context("No [caas] section in the configuration")?;

    match action {
        CaasAction::Watch => watch(caas).await,
        CaasAction::Wait {
            preview_id,
            language,
            insert,
        } => wait(caas, &preview_id, &language, insert).await,
        CaasAction::Probe { document_id } => probe(caas, &document_id).await,
    }
}

async fn watch(caas: &CaasConfig) -> anyhow::Result<()> {
    let endpoints = CaasEndpoints::parse(&caas.preview_collection_url)?;
    let client = reqwest::Client::new();
    let token = fetch_secure_token(&client, &endpoints, &caas.api_key).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let socket = ChangeSocket::new(endpoints.socket_url(&token), SocketSettings::from(caas), tx);
    let socket = tokio::spawn(socket.run());
    info!(tenant = %endpoints.tenant(), "Watching change stream, Ctrl+C to stop");

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                    Err(_) => println!("{}", text),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                socket.abort();
                return Ok(());
            }
        }
    }

    socket.await??;
    Ok(())
}

async fn wait(caas: &CaasConfig, preview_id: &str, language: &str, insert: bool) -> anyhow::Result<()> {
    let locales = Arc::new(StaticLocales::from_config(caas));
    let adapter = ChangeStreamAdapter::connect(caas, locales)?;

    if insert {
        adapter.wait_for_document_insert(preview_id, language).await?;
    } else {
        adapter.wait_for_document_update(preview_id, language).await?;
    }
    println!("{} ({}) is up to date", preview_id, language);
    Ok(())
}

async fn probe(caas: &CaasConfig, document_id: &str) -> anyhow::Result<()> {
    let endpoints = CaasEndpoints::parse(&caas.preview_collection_url)?;
    let probe = HttpProbe::new(reqwest::Client::new(), endpoints, caas.api_key.clone());

    if probe.exists(document_id).await? {
        println!("{} exists", document_id);
        Ok(())
    } else {
        anyhow::bail!("{} not found", document_id)
    }
}
