pub mod preview;
pub mod render;
pub mod send;
pub mod setup;
pub mod ui;
