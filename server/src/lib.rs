pub mod broadcast;
pub mod combat;
pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod helpers;
pub mod items;
pub mod maps;
pub mod messaging;
pub mod npc;
pub mod npc_ai;
pub mod npc_death;
pub mod npc_engine;
pub mod path_finding;
pub mod repository;
pub mod router;
pub mod server;
pub mod services;
pub mod session;
pub mod spatial;
pub mod spells;
pub mod tick;
