pub mod admission;
pub mod worker;
