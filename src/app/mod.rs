pub mod controller;

pub use controller::{Command, ConsoleController, Flow};
