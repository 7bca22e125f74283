//! A gateway whose behaviour is set by the test.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use modesta_core::{Address, Price};

use super::{
    CheckoutSessionRequest, CreatedSession, GatewayError, GatewaySession, PaymentGateway,
    PaymentStatus,
};

/// In-memory gateway for tests.
///
/// Sessions start `unpaid`; call [`ScriptedGateway::pay`] to simulate the
/// shopper completing payment.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    state: Mutex<ScriptedState>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    next_id: u64,
    sessions: HashMap<String, GatewaySession>,
    requests: Vec<CheckoutSessionRequest>,
    fail_create: bool,
    fail_get: bool,
    get_calls: usize,
}

fn outage() -> GatewayError {
    GatewayError::Api {
        status: 503,
        message: "scripted outage".to_owned(),
    }
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a session paid with the given payment reference and shipping address.
    pub fn pay(&self, session_id: &str, payment_reference: &str, shipping: Option<Address>) {
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.payment_status = PaymentStatus::Paid;
            session.payment_reference = Some(payment_reference.to_owned());
            session.shipping = shipping;
        }
    }

    /// Replace (or add) a session outright.
    pub fn set_session(&self, session: GatewaySession) {
        self.state().sessions.insert(session.id.clone(), session);
    }

    /// Make `create_session` fail until reset.
    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    /// Make `get_session` fail until reset.
    pub fn fail_get(&self, fail: bool) {
        self.state().fail_get = fail;
    }

    /// Every request passed to `create_session`, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.state().requests.clone()
    }

    /// Number of `get_session` calls so far.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.state().get_calls
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession, GatewayError> {
        let mut state = self.state();
        state.requests.push(request.clone());
        if state.fail_create {
            return Err(outage());
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{}", state.next_id);
        let amount_total = request
            .line_items
            .iter()
            .map(|item| item.unit_price.times(item.quantity))
            .try_fold(None::<Price>, |acc, line| match acc {
                None => Some(Some(line)),
                Some(total) => total.checked_add(line).map(Some),
            })
            .flatten();

        state.sessions.insert(
            session_id.clone(),
            GatewaySession {
                id: session_id.clone(),
                payment_status: PaymentStatus::Unpaid,
                payment_reference: None,
                shipping: None,
                billing: None,
                customer_email: Some(request.customer_email.to_string()),
                amount_total,
                client_reference: Some(request.order_id.to_string()),
            },
        );

        Ok(CreatedSession {
            hosted_url: format!("https://checkout.stripe.test/c/pay/{session_id}"),
            session_id,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<GatewaySession, GatewayError> {
        let mut state = self.state();
        state.get_calls += 1;
        if state.fail_get {
            return Err(outage());
        }
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(session_id.to_owned()))
    }
}
