//! Domain types for EventLab

pub mod bar;
pub mod ids;
pub mod order;
pub mod owned_asset;
pub mod position;
pub mod signal;
pub mod snapshot;

pub use bar::{Bar, BarBatch, BarError};
pub use ids::{IdGen, OrderId, RunId};
pub use order::{Order, OrderAuditEntry, OrderSide, OrderStatus, OrderType, MAX_SHARES};
pub use owned_asset::{
    apply_long_fill, apply_short_fill, OwnedAsset, OwnedAssetError, PositionAccount, TradeOutcome,
};
pub use position::{ParsePositionSideError, PositionSide};
pub use signal::SignalDirection;
pub use snapshot::{HoldingSnapshot, PortfolioSnapshot};
