mod discovery;
mod pipeline;
mod project_data;
mod provider;
mod workspace;

pub use discovery::*;
pub use pipeline::*;
pub use project_data::*;
pub use provider::*;
pub use workspace::*;
