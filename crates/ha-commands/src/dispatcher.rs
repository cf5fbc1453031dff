//! Action dispatch to Home Assistant services

use async_trait::async_trait;
use ha_core::{Domain, ServiceCall, SERVICE_TURN_ON};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::interpreter::{interpret, Action};
use crate::request::CommandRequest;
use crate::verdict::Verdict;

/// Lowest brightness accepted by `light.turn_on`
pub const BRIGHTNESS_MIN: i64 = 0;

/// Highest brightness accepted by `light.turn_on`
pub const BRIGHTNESS_MAX: i64 = 255;

/// Failure to reach the controller at all
#[derive(Debug, Error)]
pub enum ServiceCallError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Why a dispatched action did not succeed
#[derive(Debug, Error)]
pub enum DispatchFault {
    #[error("Unsupported domain: {0}")]
    UnsupportedDomain(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Exception: {0}")]
    Exception(#[from] ServiceCallError),
}

/// Status and body of a controller response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The controller's service invocation endpoint
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn call_service(&self, call: &ServiceCall) -> Result<ServiceResponse, ServiceCallError>;
}

/// Build the single service call that carries out an action.
///
/// Switches only take the entity ID. Lights take a brightness clamped to
/// `0..=255` when turning on; brightness is ignored when turning off.
pub fn plan_service_call(action: &Action) -> Result<ServiceCall, DispatchFault> {
    let service = Domain::toggle_service(action.turn_on);
    match &action.domain {
        Domain::Switch => Ok(ServiceCall::for_entity(&action.entity_id, service)),
        Domain::Light => {
            let call = ServiceCall::for_entity(&action.entity_id, service);
            match action.brightness {
                Some(brightness) if service == SERVICE_TURN_ON => Ok(call.with_data(
                    "brightness",
                    brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX),
                )),
                _ => Ok(call),
            }
        }
        Domain::Other(name) => Err(DispatchFault::UnsupportedDomain(name.clone())),
    }
}

/// Carries out interpreted actions against the controller
pub struct Dispatcher<C> {
    caller: C,
}

impl<C: ServiceCaller> Dispatcher<C> {
    pub fn new(caller: C) -> Self {
        Self { caller }
    }

    /// Issue the service call for an action and classify the response
    #[instrument(skip(self, action), fields(entity_id = %action.entity_id, state = action.state_label()))]
    pub async fn dispatch(&self, action: &Action) -> Result<Verdict, DispatchFault> {
        let call = plan_service_call(action)?;
        debug!(service = %call.service_id(), data = %call.service_data, "Calling service");

        let response = self.caller.call_service(&call).await?;
        if !response.is_success() {
            warn!(status = response.status, "Service call rejected");
            return Err(DispatchFault::Status {
                code: response.status,
                body: response.body,
            });
        }

        info!(service = %call.service_id(), "Service call succeeded");
        Ok(Verdict::SuccessWithNote(format!(
            "Set {} to {}",
            action.entity_id,
            action.state_label()
        )))
    }

    /// Interpret and dispatch a command, always resolving to a verdict
    pub async fn execute(&self, request: &CommandRequest) -> Verdict {
        let action = match interpret(request) {
            Ok(action) => action,
            Err(rejected) => {
                debug!(command = %request.name, reason = %rejected, "Command rejected");
                return rejected.into();
            }
        };
        self.dispatch(&action).await.unwrap_or_else(Verdict::from)
    }

    pub fn caller(&self) -> &C {
        &self.caller
    }
}
