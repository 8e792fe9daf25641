pub mod assignments;
pub mod availability;
pub mod classes;
pub mod conflicts;
pub mod core;
pub mod entities;
pub mod groups;
pub mod setup;
pub mod slots;
