//! studiosync - cache synchronization core for a studio CRM.
//!
//! Keeps an in-memory query cache of leads, customers and the pipeline
//! summary consistent with a REST backend under two kinds of concurrent
//! change: local optimistic mutations and server push events delivered
//! over STOMP.
//!
//! # Modules
//!
//! - [`domain`] - Records, query keys, filters and push events
//! - [`port`] - Backend and push transport traits
//! - [`application`] - Query cache, optimistic mutations, realtime merge
//! - [`adapter`] - REST client, STOMP transport and the operator CLI
//! - [`infrastructure`] - Configuration and runtime wiring
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use studiosync::domain::{LeadFilter, LeadId, LeadStatus};
//! use studiosync::infrastructure::bootstrap::build_services;
//! use studiosync::infrastructure::config::Config;
//!
//! # async fn demo() -> studiosync::error::Result<()> {
//! let config = Config::load("studiosync.toml")?;
//! let services = build_services(&config)?;
//! let page = services.client.leads(&LeadFilter::default()).await?;
//! if let Some(lead) = page.data.first() {
//!     services
//!         .mutations
//!         .change_lead_status(lead.id.clone(), LeadStatus::InProgress)
//!         .await?;
//! }
//! # let _ = LeadId::new("42");
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
