pub mod events;
pub mod subscription;
