//! Inventory API
//!
//! REST backend for the inventory and sales management domain: brands,
//! users, organizations, warehouses and stock, customers, sales with their
//! payments and shipments, payment instruments and the lookup tables they
//! reference. Rows live in PostgreSQL with soft delete; images (logos,
//! profile pictures, instrument scans) live in S3 and are served through
//! presigned links minted on every read.
//!
//! ## Features
//!
//! - **Generic resources**: one repository and one service implementation
//!   shared by every resource, parameterised by a static table schema
//! - **Image uploads**: multipart parsing with type and size checks, stored
//!   only after the request attributes validate
//! - **Transactional cleanup**: superseded and orphaned objects are queued in
//!   an outbox table inside the mutation's transaction and deleted after
//!   commit, with a background sweeper retrying failures
//! - **Presigned URL enrichment**: fresh time-limited links on every read,
//!   never persisted
//!
//! ## Architecture
//!
//! ```text
//!  HTTP /api/<resource>
//!        │
//!        ▼
//! ┌──────────────┐  multipart   ┌──────────────┐   put/presign   ┌──────────────┐
//! │ Router       │─────────────▶│ Submission   │────────────────▶│ S3 Object    │
//! │ (axum)       │              │ extractor    │                 │ Store        │
//! └──────────────┘              └──────────────┘                 └──────────────┘
//!        │                                                          ▲      ▲
//!        ▼                                                          │      │
//! ┌──────────────┐   changeset  ┌──────────────┐  object_deletions  │      │
//! │ Resource     │─────────────▶│ Repository   │──────────┐         │      │
//! │ Service      │──────────────┼──────────────┼──────────┼─presign─┘      │
//! └──────────────┘              └──────────────┘          ▼                │
//!                                      │           ┌──────────────┐ delete │
//!                                      ▼           │ Cleanup      │────────┘
//!                               ┌──────────────┐   │ Queue        │
//!                               │ PostgreSQL   │◀──│ + sweeper    │
//!                               └──────────────┘   └──────────────┘
//! ```

pub mod api;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod form;
pub mod metrics;
pub mod object_store;
pub mod password;
pub mod repository;
pub mod resources;
pub mod response;
pub mod service;
pub mod upload;

pub use api::{create_router, start_api_server, AppState};
pub use cleanup::CleanupQueue;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use object_store::{ObjectStore, S3ObjectStore, StorageError};
pub use repository::{Changeset, Entity, Repository, TableSchema};
pub use service::{Resource, ResourceService};
