//! Task manager core: registry, listener rebinding and owner lifecycle.
//!
//! Internal modules:
//! - [`manager`]: tag-keyed registry and submission checks;
//! - [`shadow`]: wrapper listener that clears the registry on terminal delivery;
//! - [`resolver`]: owner-side listener lookup;
//! - [`lifecycle`]: start/stop/destroy glue for owners;
//! - [`builder`]: manager construction (pool, serial lane, bus, subscribers).

mod builder;
mod lifecycle;
mod manager;
mod resolver;
mod shadow;

pub use builder::TaskManagerBuilder;
pub use lifecycle::LifecycleProxy;
pub use manager::TaskManager;
pub use resolver::{Resolver, ResolverRef};
