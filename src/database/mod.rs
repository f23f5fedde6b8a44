pub mod document_store;
pub mod identity_store;
pub mod manager;
pub mod models;
pub mod notification_store;
pub mod reference_store;

pub use document_store::{DocumentStore, MongoDocumentStore};
pub use identity_store::{IdentityStore, PgIdentityStore};
pub use manager::{DatabaseError, DatabaseManager};
pub use notification_store::{NotificationStore, PgNotificationStore};
pub use reference_store::{PgReferenceStore, ReferenceStore};
