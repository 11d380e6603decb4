use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use log::LevelFilter;
use tokio::sync::watch;

use server::config::GameConfig;
use server::items::{ItemCatalog, ItemDef, LootEntry, LootTables};
use server::maps::MapRegistry;
use server::npc::{NpcCatalog, NpcTemplate, SpawnEntry};
use server::repository::{MemoryRepository, RedisRepository};
use server::server::GameServer;
use server::services::{Catalogs, Repositories, Services};
use server::spells::{Spell, SpellCatalog};

fn parse_log_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Pre-baked catalog files (the external tooling's JSON output).
fn load_json<T: serde::de::DeserializeOwned>(path: &str) -> Option<T> {
    let path = Path::new(path);
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from))
    {
        Ok(value) => Some(value),
        Err(err) => {
            log::error!("failed to load {}: {err}", path.display());
            None
        }
    }
}

fn load_catalogs() -> Catalogs {
    let npcs: Vec<NpcTemplate> = load_json("data/npcs.json").unwrap_or_default();
    let spells: Vec<Spell> = load_json("data/spells.json").unwrap_or_default();
    let items: Vec<ItemDef> = load_json("data/items.json").unwrap_or_default();
    let loot: std::collections::HashMap<i32, Vec<LootEntry>> =
        load_json("data/loot.json").unwrap_or_default();

    log::info!(
        "catalogs loaded: {} npc(s), {} spell(s), {} item(s), {} loot table(s)",
        npcs.len(),
        spells.len(),
        items.len(),
        loot.len()
    );
    Catalogs {
        npcs: Arc::new(NpcCatalog::from_templates(npcs)),
        spells: Arc::new(SpellCatalog::from_spells(spells)),
        items: Arc::new(ItemCatalog::from_items(items)),
        loot: Arc::new(LootTables::from_tables(loot)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let config =
        GameConfig::load(Some(Path::new(&config_path))).context("loading configuration")?;

    game_core::initialize_logger(
        parse_log_level(&config.logging.level),
        config.logging.file.as_deref(),
    )
    .context("initializing logger")?;

    log::info!("starting game server (pid {})", process::id());

    let maps = match MapRegistry::load_dir(Path::new("data/maps")) {
        Ok(maps) => maps,
        Err(err) => {
            log::warn!("no baked maps available ({err}); starting with an empty world grid");
            MapRegistry::new()
        }
    };

    let repos = match RedisRepository::connect(&config.redis.url()).await {
        Ok(repo) => {
            log::info!("connected to the store at {}", config.redis.url());
            Repositories::from_redis(repo)
        }
        Err(err) => {
            log::warn!(
                "store unavailable at {} ({err}); falling back to the in-memory repository",
                config.redis.url()
            );
            Repositories::from_memory(Arc::new(MemoryRepository::new()))
        }
    };

    let services = Services::build(config, maps, load_catalogs(), repos);

    let spawns: Vec<SpawnEntry> = load_json("data/spawns.json").unwrap_or_default();
    if spawns.is_empty() {
        log::warn!("no spawn table found; the world starts without NPCs");
    } else {
        let spawned = services.npc_engine.spawn_from_config(&spawns).await?;
        log::info!("{spawned} NPC(s) placed in the world");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut scheduler = services.build_scheduler().await;
    let tick_shutdown = shutdown_rx.clone();
    let tick_handle = tokio::spawn(async move {
        scheduler.run(tick_shutdown).await;
    });

    let server = GameServer::new(services.clone());
    let listener_shutdown = shutdown_rx;
    let listener_services = services.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(err) = server.run(listener_shutdown).await {
            log::error!("listener failed: {err}");
            listener_services.shutdown();
            process::exit(1);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    log::info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = tick_handle.await;
    let _ = listener_handle.await;
    services.shutdown();

    log::info!("server shutdown complete");
    Ok(())
}
