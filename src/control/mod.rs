pub mod composer;
pub mod direction;
