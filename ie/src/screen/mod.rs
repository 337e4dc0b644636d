pub mod crafting;
pub mod dispatch;
pub mod tasks;
