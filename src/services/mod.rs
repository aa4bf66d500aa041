pub mod events;
pub mod poller;
pub mod projection;
pub mod replicate;
pub mod signature;
pub mod store;
