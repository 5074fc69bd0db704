// Remote collaborator seams: session, catalog, and blob services.

pub mod http;
pub mod traits;
