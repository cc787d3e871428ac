mod grid;

pub use grid::{GridLayout, LayoutError, compute, distribute, grid_dimensions};
