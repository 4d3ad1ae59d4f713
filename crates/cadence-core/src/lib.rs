pub mod accounts;
pub mod chain;
pub mod config;
pub mod error;
pub mod load;
pub mod monitor;
pub mod orchestrator;
pub mod pacer;
pub mod read_load;
pub mod signer;
pub mod stats;
pub mod store;
pub mod transport;
pub mod verdict;

pub use accounts::*;
pub use config::*;
pub use error::*;
pub use load::*;
pub use monitor::*;
pub use orchestrator::*;
pub use pacer::*;
pub use read_load::*;
pub use signer::*;
pub use stats::*;
pub use store::*;
pub use transport::*;
pub use verdict::*;
