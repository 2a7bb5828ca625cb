pub mod down;
pub mod ls;
pub mod plan;
pub mod up;
pub mod validate;
