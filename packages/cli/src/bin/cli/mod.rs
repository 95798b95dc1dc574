pub mod checkpoints;
pub mod output;
pub mod run;
