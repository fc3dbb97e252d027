pub mod catalog;
pub mod governor;
pub mod movie_nights;
pub mod preferences;
pub mod providers;
pub mod recommendations;
pub mod users;

pub use governor::{GovernorConfig, GovernorHandle, RequestGovernor};
pub use providers::{CatalogProvider, TmdbProvider};
