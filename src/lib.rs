//! Subsonic-to-Jellyfin protocol gateway library.

pub mod api;
pub mod jellyfin;
pub mod value;
