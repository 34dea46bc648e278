//! Auth event enrichment.

use std::sync::Arc;

use crate::device::parse_user_agent;
use crate::geo::{GeoProvider, GeoResolver};
use warden_core::{AuditRecord, AuthEvent};

/// Augments raw auth events with parsed device info and geolocation.
///
/// Missing `user_agent`/`ip_address` leave the corresponding enrichment
/// fields unset; enrichment never fails.
pub struct EventEnricher {
    geo: GeoResolver,
}

impl EventEnricher {
    /// Creates an enricher backed by a geolocation collaborator.
    pub fn new(provider: Arc<dyn GeoProvider>) -> Self {
        Self {
            geo: GeoResolver::new(provider),
        }
    }

    /// Enriches a raw event into an audit record.
    pub async fn enrich(&self, event: AuthEvent) -> AuditRecord {
        let device = event.user_agent.as_deref().map(parse_user_agent);
        let geo = match &event.ip_address {
            Some(ip) => self.geo.resolve(ip).await,
            None => None,
        };

        let mut record = AuditRecord::from_event(event);
        record.device = device;
        record.geo = geo;
        record
    }
}
