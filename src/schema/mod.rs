pub mod line;
pub mod script;
