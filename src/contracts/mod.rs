// Contracts Module - Public ABIs Only

pub mod erc20;
pub mod i_amm_factory;
pub mod i_amm_pool;
pub mod quoter_v2;
pub mod swap_router;

// Public exports
pub use erc20::Erc20;
pub use i_amm_factory::IAmmFactory;
pub use i_amm_pool::IAmmPool;
pub use quoter_v2::{QuoteExactInputSingleParams, QuoterV2};
pub use swap_router::{ExactInputParams, ExactInputSingleParams, SwapRouter};
