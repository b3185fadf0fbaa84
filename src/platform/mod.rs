// Concrete backends for the capability traits in core/

pub mod camera;
pub mod controls;
pub mod display;
pub mod pose;
