pub mod history;
pub mod referee;
pub mod result;
pub mod state;

pub use history::*;
pub use referee::*;
pub use result::*;
pub use state::*;
