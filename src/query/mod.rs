mod execute;
mod registry;
mod template;

pub use execute::{run_query, ResultSet};
pub use registry::{Endpoint, Registry};
pub use template::{is_valid_identifier, BoundValue, Frag, QueryTemplate, RenderedQuery};
