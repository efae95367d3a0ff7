use std::sync::Arc;

use chrono::Duration;

use crate::clock::Clock;
use crate::issuance::IssuanceService;
use crate::redemption::RedemptionService;
use crate::store::SessionStore;

pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub clock: Arc<dyn Clock>,
    pub session_ttl: Duration,
    pub issuance: IssuanceService,
    pub redemption: RedemptionService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        code_window: Duration,
        session_ttl: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            issuance: IssuanceService::new(store.clone(), clock.clone(), code_window),
            redemption: RedemptionService::new(store.clone(), clock.clone()),
            store,
            clock,
            session_ttl,
        })
    }
}
