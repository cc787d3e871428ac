pub mod backdrop;
pub mod overlay;
pub mod renderer;
pub mod slot;
pub mod thumbnail;
