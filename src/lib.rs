//! Real-time forex dashboard core: streaming feed ingestion, rolling candle
//! history, and update dispatch between the wire and the render boundary.

pub mod error;
pub mod feed;
pub mod render;
pub mod state;

pub use error::AppError;
pub use feed::buffer::TimeSeriesBuffer;
pub use feed::dispatcher::UpdateDispatcher;
pub use feed::subscription::SubscriptionManager;
pub use feed::types::{
    Candle, ConnectionState, FeedConfig, FeedConfigArgs, Instrument, RateSnapshot,
};
pub use render::{PairDisplay, RenderListener};
pub use state::AppContext;
