// Demo Dash Core Library
// Simulated trading engine behind the dashboard

pub mod buffer;
pub mod config_store;
pub mod error;
pub mod gate;
pub mod market;
pub mod models;
pub mod positions;
pub mod rpc_client;
pub mod settings;
pub mod simulation;
pub mod state;
pub mod strategy;

// Re-exports
pub use buffer::{BoundedBuffer, EventLog, TradeLedger};
pub use config_store::ConfigStore;
pub use error::CoreError;
pub use market::{DemoMarket, MarketSignals, MarketSource};
pub use models::*;
pub use positions::PositionTracker;
pub use rpc_client::*;
pub use settings::{Filters, RiskSettings, Settings, SimulationSettings};
pub use state::{BotStatus, DashboardState, DashboardStatus};
