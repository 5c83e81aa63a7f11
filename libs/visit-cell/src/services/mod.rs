pub mod lifecycle;
pub mod visit;

pub use lifecycle::VisitLifecycle;
pub use visit::VisitService;
