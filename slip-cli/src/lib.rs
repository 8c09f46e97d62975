pub mod args;
pub mod echo;
