pub mod registry;
pub mod validators;

pub use registry::{DirectiveSpec, RoleSpec, RstObjectSpec, Spec, SPEC_VERSION};
pub use validators::{InvalidOptionValue, PrimitiveType};
