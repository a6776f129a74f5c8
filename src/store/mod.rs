pub mod diff;
pub mod memory;

pub use memory::{MemoryStore, Subscription};

/// Logical collections of the persisted state layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Deliveries,
    Messages,
    Settings,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Deliveries => "deliveries",
            Collection::Messages => "messages",
            Collection::Settings => "settings",
        }
    }
}
