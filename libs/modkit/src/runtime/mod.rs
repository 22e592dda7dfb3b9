mod runner;

pub use runner::{run, DbOptions, RunOptions, ShutdownOptions, StopSignal};
