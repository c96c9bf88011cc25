//! Local persistence for Nimbus: favorite places and the last viewed place.

pub mod error;
pub mod favorites;
pub mod last_place;

pub use error::{StorageError, StorageResult};
pub use favorites::{FavoritePlace, FavoritesStore, SqliteFavoritesStore};
pub use last_place::{FileLastPlaceStore, LastPlaceStore};
