//! SQLite backend implementation.
//!
//! All tenants share one `records` table. Isolation is enforced in two
//! places: the scoped session adds an owner predicate to every query, and
//! every statement issued here also carries a condition on the
//! connection-private `temp.isolation_scope` table, which holds the scope of
//! the session currently using the connection.
//!
//! # Example
//!
//! ```no_run
//! use bastion_persistence::backends::sqlite::SqliteBackend;
//! use bastion_persistence::isolation::IsolatedStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/bastion.db")?;
//! backend.init_schema()?;
//! let store = IsolatedStore::new(backend);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE records (
//!     collection TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     tenant_id INTEGER NOT NULL CHECK (tenant_id > 0),
//!     version INTEGER NOT NULL,
//!     data TEXT NOT NULL,          -- JSON body
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     PRIMARY KEY (collection, id)
//! );
//!
//! -- per connection
//! CREATE TEMP TABLE isolation_scope (tenant_id INTEGER, privileged INTEGER);
//! ```

mod backend;
mod connection;
mod manager;
mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use connection::SqliteConnection;
pub use manager::{ScopedConnectionError, ScopedConnectionManager};
pub use schema::SCHEMA_VERSION;
