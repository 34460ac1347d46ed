pub mod extract;
pub mod locate;
pub mod profile;
pub mod superblock;
pub mod util;

pub use extract::*;
pub use locate::*;
pub use profile::*;
pub use superblock::*;
pub use util::*;
