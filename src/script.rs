pub mod application;
pub mod binding;
pub mod document;
pub mod value;
