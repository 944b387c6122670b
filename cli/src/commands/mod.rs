pub mod config;
pub mod prepare;
pub mod run;
