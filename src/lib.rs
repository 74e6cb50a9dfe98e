#[macro_use]
extern crate log;

pub mod config;
pub mod errors;
pub mod gate;
pub mod progress;
pub mod receiver;
pub mod sqs;
pub mod work;
