pub mod canvas;
pub mod generation;
pub mod models;
pub mod tools;
