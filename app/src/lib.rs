pub mod backend;
pub mod config;
pub mod registry;
pub mod resolver;
pub mod search;
pub mod sync;
pub mod viewport;

pub use backend::{Backend, HttpBackend, SourceEntry};
pub use config::Config;
pub use search::{SearchBox, SearchView, SubmitOutcome, SubmitPhase};
pub use sync::{ScaleCoupling, ViewTarget, ViewportSync};
pub use viewport::{LinearScale, LocalViewport, ViewDomains, Viewport};
