//! Client-side layer: gateway contracts for the remote auth and record
//! store, an HTTP implementation of both, and the application-state
//! controller a front-end drives with user events.

pub mod controller;
pub mod gateway;

pub use controller::{AppController, ClientError, RecordDraft};
pub use gateway::{GatewayError, HttpGateway, RecordGateway, Session, SessionGateway};
