pub mod directory;

pub use directory::UserService;
