// Domain layer: scene / change models and the ports (interfaces) the pipeline runs against.

pub mod model;
pub mod ports;
