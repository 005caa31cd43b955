pub mod backend;
pub mod file;
pub mod header;
pub mod loader;
pub mod memory;
pub mod types;

#[cfg(test)]
mod tests;

pub use backend::*;
pub use file::*;
pub use loader::*;
pub use memory::*;
pub use types::*;
