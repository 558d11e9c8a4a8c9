//! One module per subcommand. Each exposes an `execute` function.

pub mod add;
pub mod delete;
pub mod entries;
pub mod get;
pub mod init;
pub mod rotate;
pub mod section;
