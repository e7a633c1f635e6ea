mod catalog;
mod class_instance;
mod filter;
mod ledger;
mod obligation;
mod shared;
mod timespan;
mod user;

pub use catalog::{CatalogDimension, CatalogEntry, CatalogSnapshot, NameDirectory};
pub use class_instance::ClassInstance;
pub use filter::{
    matching_instances, FilterLabels, Predicate, TimeOfDay, TimeOfDayRange, UserFilter,
};
pub use ledger::LedgerEntry;
pub use obligation::NotificationObligation;
pub use shared::entity::{Entity, InvalidIDError, ID};
pub use timespan::TimeSpan;
pub use user::User;
