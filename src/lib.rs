extern crate enum_dispatch;

pub mod signal;

pub mod model;
pub mod script;
