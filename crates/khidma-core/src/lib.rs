//! Core library for the khidma servant-administration dashboard.
//!
//! Talks to the dashboard REST backend through [`ApiClient`], which keeps the session alive
//! across access-token expiry, and answers attendance questions over the retreat roster.

pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod logging;
pub mod models;
pub mod report;
pub mod resources;
pub mod secret_store;

pub use api::{
    ApiClient, ApiError, ClientSettings, RefreshFailure, RequestOptions, Session, SessionHooks,
    SessionSnapshot,
};
pub use attendance::{AttendanceFilter, attendee_ids_in_range, missing_from, resolve_range};
pub use auth::{Claims, current_claims, login, logout};
pub use config::{
    ConfigError, ConfigLoadResult, ConfigSource, FileConfig, config_directory, config_path,
    load_config, save_config,
};
pub use dashboard::DashboardStats;
pub use logging::{LoggingDestination, LoggingError, init_logging};
pub use models::{
    AttendeeRef, Note, NoteTarget, Page, Retreat, RetreatInput, Role, Servant, ServantInput,
    ServantUpdate, Servantee, ServanteeInput,
};
pub use report::{ReportError, ReportFormat, RetreatReport};
pub use resources::ListQuery;
pub use secret_store::{SecretStoreError, SessionVault};
