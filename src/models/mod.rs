pub mod analy;
pub mod concept;
pub mod report;
pub mod settings;
pub mod stock;
