mod account;
mod market;
mod money;
mod offer;
mod request;
mod seed;
mod transition;

pub use account::*;
pub use market::*;
pub use money::*;
pub use offer::*;
pub use request::*;
pub use seed::*;
pub use transition::*;
