pub mod food_entry;
pub mod summary;

pub use food_entry::FoodEntryHandler;
