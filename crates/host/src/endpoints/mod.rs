//! # Hostエンドポイント

pub mod navigation;
pub mod player;

pub use navigation::{handle_clear_navigation, handle_last_navigation, handle_navigation};
pub use player::handle_player;
