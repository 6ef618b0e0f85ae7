//! # Pool API
//!
//! JSON/HTTP boundary of the pool engine. Amounts cross the wire as decimal
//! strings in whole token units and are converted to integer base units with
//! each token's configured decimals before they reach the engine.
//!
//! | Route | Method |
//! |---|---|
//! | `/api/pools`, `/api/pools/{id}` | GET |
//! | `/api/pools/{id}/pause`, `/api/pools/{id}/resume` (with `server.enable_admin`) | POST |
//! | `/api/add-liquidity`, `/api/remove-liquidity` | POST |
//! | `/api/stake-tokens`, `/api/unstake-tokens`, `/api/relock` | POST |
//! | `/api/claim-rewards` | POST |
//! | `/api/quote`, `/api/swap` | POST |
//! | `/api/positions?user=` | GET |
//! | `/health`, `/status` | GET |

pub mod dto;
pub mod error;
pub mod registry;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use registry::TokenRegistry;
pub use routes::routes;
pub use server::ApiServer;
pub use state::ApiState;
