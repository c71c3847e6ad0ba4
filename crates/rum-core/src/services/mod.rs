//! Services shared by the sync engine and front ends

mod store;

pub use store::StoreService;
