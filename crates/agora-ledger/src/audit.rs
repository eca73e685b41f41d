//! Audit service: appends, listings, bundle export and restore.

use agora_audit::{
    AuditBundle, AuditEvent, AuditFilter, AuditPage, ExportFormat, NewAuditEvent, Pagination,
};
use agora_core::TenantId;

use crate::error::LedgerError;
use crate::journal::WriteSet;
use crate::store::TransactionalStore;
use crate::Ledger;

/// A rendered audit bundle.
#[derive(Debug, Clone)]
pub struct BundleExport {
    /// MIME type of `body`.
    pub content_type: &'static str,
    /// Rendered bundle.
    pub body: String,
    /// Events in the bundle.
    pub total_events: usize,
    /// The exporter's verdict at export time.
    pub chain_valid: bool,
}

impl<S: TransactionalStore> Ledger<S> {
    /// Append an event on behalf of a collaborator.
    pub fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, LedgerError> {
        let now = self.now();
        self.store.write(|t| {
            let prepared = t.audit.prepare(event, now)?;
            self.commit_audited(t, WriteSet::default(), prepared)
        })
    }

    /// Filtered, paginated listing of one tenant's chain.
    pub fn list_audit(&self, filter: &AuditFilter, page: Pagination) -> AuditPage {
        self.store.read(|t| t.audit.list(filter, page))
    }

    /// Every event of a tenant, in chain order.
    pub fn audit_events(&self, tenant_id: &TenantId) -> Vec<AuditEvent> {
        self.store.read(|t| t.audit.events(tenant_id).to_vec())
    }

    /// Build and render the tenant's export bundle.
    pub fn export_audit_bundle(
        &self,
        tenant_id: &TenantId,
        format: ExportFormat,
    ) -> Result<BundleExport, LedgerError> {
        let now = self.now();
        let bundle = self
            .store
            .read(|t| AuditBundle::build(tenant_id.clone(), t.audit.events(tenant_id), now));
        if !bundle.verification.chain_valid {
            tracing::error!(tenant_id = %tenant_id, "exported audit chain does not verify");
        }
        let content_type = match format {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        };
        Ok(BundleExport {
            content_type,
            body: bundle.render(format)?,
            total_events: bundle.total_events,
            chain_valid: bundle.verification.chain_valid,
        })
    }

    /// Load persisted events back into the log. Returns how many were new.
    pub fn restore_audit_events(
        &self,
        events: impl IntoIterator<Item = AuditEvent>,
    ) -> Result<usize, LedgerError> {
        let restored = self.store.write(|t| t.audit.restore(events))?;
        tracing::info!(restored, "audit events restored");
        Ok(restored)
    }
}
