mod fetch;
mod ref_walker;
mod walker;

pub use fetch::Fetch;
pub use ref_walker::RefWalker;
pub use walker::Walker;
