pub mod client;
pub mod reset;
pub mod status;
pub mod switch;
pub mod watch;
pub mod workspace;

pub use client::*;
pub use reset::*;
pub use status::*;
pub use switch::*;
pub use watch::*;
pub use workspace::*;
