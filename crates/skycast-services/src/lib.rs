pub mod bootstrap;
pub mod error_mapping;
pub mod service;
pub mod session;
pub mod state;
pub mod store;

pub use error_mapping::IntoAppError;
pub use service::{ServiceError, SessionHandle, SessionService};
pub use session::{Applied, CityChange, FetchTicket, SessionController, SessionView};
pub use state::SessionState;
pub use store::{
    JsonFileStore, KeyValueStore, KeyValueStoreExt, MemoryStore, StoreError, CITY_KEY,
    DEFAULT_CITY,
};
