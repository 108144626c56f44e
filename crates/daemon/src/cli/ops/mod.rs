pub mod cleanup;
pub mod directory;
pub mod download;
pub mod init;
pub mod lookup;
pub mod mirror;
pub mod new;
pub mod store;

pub use cleanup::Cleanup;
pub use directory::Directory;
pub use download::Download;
pub use init::Init;
pub use lookup::Lookup;
pub use mirror::Mirror;
pub use new::New;
pub use store::Store;
