// Display surfaces implementing core/display.rs

pub mod canvas;

pub use canvas::CanvasSurface;
