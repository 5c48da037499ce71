//! Subsonic operation handlers.

pub mod browsing;
pub mod media;
pub mod system;

pub use browsing::*;
pub use media::*;
pub use system::*;
