pub mod common;
pub mod feed;
pub mod publish;
pub mod run;
