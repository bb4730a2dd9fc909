pub mod braid;
pub mod init;
pub mod motif;
pub mod prediction;
pub mod run;
