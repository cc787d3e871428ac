pub mod event;
pub mod geometry;
pub mod headless;
pub mod platform;
pub mod screen;
