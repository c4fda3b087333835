//! Multi-agent OAuth 2.0 token broker for chat agents: agent self-authentication, on-behalf-of
//! exchanges carrying an actor token, and flow-state gated booking tools.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod flow_state;
pub mod flows;
pub mod gate;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod pkce;
pub mod store;
pub mod tools;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
