pub mod args;

pub use args::{parse_runtime_args, ChainBackend, RuntimeArgs};
