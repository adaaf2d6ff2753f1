//! CLI commands

mod identities;
mod init;
mod pack;

pub use identities::IdentitiesCommand;
pub use init::InitCommand;
pub use pack::PackCommand;
