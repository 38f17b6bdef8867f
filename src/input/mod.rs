pub mod device;
pub mod pedals;
pub mod sampler;
