pub mod error;
pub mod handle;
pub mod orchestrator;
pub mod owner;
pub mod record;
pub mod state;
pub mod subscribers;


pub use error::*;
pub use handle::*;
pub use orchestrator::*;
pub use owner::*;
pub use record::*;
pub use state::*;
pub use subscribers::*;
