pub mod frame;
pub mod label;

pub use frame::Frame;
pub use label::Label;
