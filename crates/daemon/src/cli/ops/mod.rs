pub mod keygen;
pub mod serve;
pub mod version;

pub use keygen::Keygen;
pub use serve::Serve;
pub use version::Version;
