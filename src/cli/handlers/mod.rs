pub mod check;
pub mod env;

// Re-export handler functions for convenience
pub use check::handle_check_command;
pub use env::handle_env_command;
