pub mod dump;
pub mod lines;
pub mod store;
pub mod tokenize;
