pub mod events;
pub mod record;
pub mod traits;
