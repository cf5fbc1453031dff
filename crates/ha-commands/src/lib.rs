//! Remote command handling for the Home Assistant IoTConnect bridge
//!
//! A [`CommandRequest`] received from IoTConnect goes through two stages:
//!
//! - [`interpret`] validates the command name and positional arguments and
//!   produces an [`Action`], or a [`CommandRejected`] reason.
//! - [`Dispatcher`] turns the action into exactly one Home Assistant service
//!   call through a [`ServiceCaller`] and maps the outcome to a [`Verdict`].
//!
//! Neither stage keeps state between commands, and every path ends in a
//! verdict: validation and RPC failures become [`Verdict::Failed`] with a
//! human-readable reason rather than errors.

mod dispatcher;
mod interpreter;
mod request;
mod rest;
mod verdict;

pub use dispatcher::{
    plan_service_call, DispatchFault, Dispatcher, ServiceCallError, ServiceCaller,
    ServiceResponse, BRIGHTNESS_MAX, BRIGHTNESS_MIN,
};
pub use interpreter::{interpret, Action, CommandRejected};
pub use request::{AckHandle, CommandRequest, COMMAND_SET_HA_ENTITY, COMMAND_SET_HA_LIGHT};
pub use rest::RestClient;
pub use verdict::Verdict;

pub use ha_core::{EntityId, ServiceCall};
